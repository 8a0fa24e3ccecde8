//! Static declaration of version axes.
//!
//! The declaration is a small version-controlled TOML table. Each axis lists
//! its candidates either as bare version strings or as tables carrying an
//! `essential` flag. An axis where any candidate carries the flag is gated:
//! narrow mode filters it down to its essential candidates.

use crate::error::{ConfigurationError, Result};
use crate::matrix::{env_key, role_key};
use crate::selection::SelectionRule;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Selection label used when neither the declaration nor the caller names one.
pub const DEFAULT_SELECTION_LABEL: &str = "ci:full-matrix";

/// One concrete value on an axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCandidate {
    /// Version identifier handed to the job runner.
    pub version: String,

    /// Whether this candidate runs even in narrow mode.
    pub is_essential: bool,
}

impl VersionCandidate {
    /// A candidate that only runs in broad mode.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            is_essential: false,
        }
    }

    /// A candidate that always runs.
    pub fn essential(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            is_essential: true,
        }
    }
}

/// One independent dimension of the test matrix.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(from = "RawAxis")]
pub struct VersionAxis {
    /// Axis name, used as the key in the computed plan.
    pub name: String,

    /// Candidates in declaration order.
    pub candidates: Vec<VersionCandidate>,

    /// Whether candidates carry essentiality and the axis is filtered in
    /// narrow mode.
    pub gated: bool,
}

impl VersionAxis {
    /// An axis passed through unfiltered in every mode.
    pub fn plain<I, S>(name: impl Into<String>, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            candidates: versions.into_iter().map(VersionCandidate::new).collect(),
            gated: false,
        }
    }

    /// An axis filtered down to its essential candidates in narrow mode.
    pub fn gated(name: impl Into<String>, candidates: Vec<VersionCandidate>) -> Self {
        Self {
            name: name.into(),
            candidates,
            gated: true,
        }
    }

    /// Candidates marked essential, in declaration order.
    pub fn essential_candidates(&self) -> impl Iterator<Item = &VersionCandidate> {
        self.candidates.iter().filter(|c| c.is_essential)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAxis {
    name: String,
    candidates: Vec<RawCandidate>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCandidate {
    Bare(String),
    Flagged(FlaggedCandidate),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FlaggedCandidate {
    version: String,
    essential: Option<bool>,
}

impl From<RawAxis> for VersionAxis {
    fn from(raw: RawAxis) -> Self {
        let mut gated = false;
        let candidates = raw
            .candidates
            .into_iter()
            .map(|candidate| match candidate {
                RawCandidate::Bare(version) => VersionCandidate::new(version),
                RawCandidate::Flagged(FlaggedCandidate { version, essential }) => {
                    gated |= essential.is_some();
                    VersionCandidate {
                        version,
                        is_essential: essential.unwrap_or(false),
                    }
                }
            })
            .collect();

        Self {
            name: raw.name,
            candidates,
            gated,
        }
    }
}

/// Selection settings carried by the declaration file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SelectionSection {
    /// Label that forces broad mode on a reviewable change.
    pub label: Option<String>,
}

/// The full declaration file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    #[serde(default)]
    pub selection: SelectionSection,

    #[serde(rename = "axis", default)]
    pub axes: Vec<VersionAxis>,
}

impl Declaration {
    /// Parse a declaration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a declaration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let declaration = Self::from_toml_str(&text)?;
        debug!(
            path = %path.display(),
            axes = declaration.axes.len(),
            "Loaded axis declaration"
        );
        Ok(declaration)
    }

    /// Check the axis table without computing a plan.
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        validate_axes(&self.axes)
    }

    /// Selection rule from the file, or the default label.
    pub fn selection_rule(&self) -> SelectionRule {
        SelectionRule::new(
            self.selection
                .label
                .clone()
                .unwrap_or_else(|| DEFAULT_SELECTION_LABEL.to_string()),
        )
    }
}

/// Validate a set of axes.
///
/// Checks run axis by axis in declaration order, so the first defect found
/// is the one reported.
pub fn validate_axes(axes: &[VersionAxis]) -> std::result::Result<(), ConfigurationError> {
    if axes.is_empty() {
        return Err(ConfigurationError::NoAxes);
    }

    let mut names = HashSet::new();
    let mut env_keys = HashSet::new();
    for (index, axis) in axes.iter().enumerate() {
        if axis.name.trim().is_empty() {
            return Err(ConfigurationError::UnnamedAxis { index });
        }
        if !names.insert(axis.name.as_str()) {
            return Err(ConfigurationError::DuplicateAxis {
                axis: axis.name.clone(),
            });
        }

        // Keys must stay distinct once names are folded to TESTPLAN_<AXIS>.
        let key = env_key(&axis.name);
        let mut keys = Vec::with_capacity(2);
        if axis.gated {
            keys.push(role_key(&key));
        }
        keys.push(key);
        for key in keys {
            if !env_keys.insert(key.clone()) {
                return Err(ConfigurationError::EnvKeyCollision {
                    axis: axis.name.clone(),
                    key,
                });
            }
        }

        if axis.candidates.is_empty() {
            return Err(ConfigurationError::EmptyAxis {
                axis: axis.name.clone(),
            });
        }

        let mut versions = HashSet::new();
        for candidate in &axis.candidates {
            if candidate.version.trim().is_empty() {
                return Err(ConfigurationError::EmptyVersion {
                    axis: axis.name.clone(),
                });
            }
            if !versions.insert(candidate.version.as_str()) {
                return Err(ConfigurationError::DuplicateVersion {
                    axis: axis.name.clone(),
                    version: candidate.version.clone(),
                });
            }
        }

        if axis.gated && axis.essential_candidates().next().is_none() {
            return Err(ConfigurationError::NoEssentialCandidate {
                axis: axis.name.clone(),
            });
        }
    }

    Ok(())
}
