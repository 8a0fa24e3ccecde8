//! Plan computation: filter gated axes and tag their entries.

use crate::declaration::{validate_axes, VersionAxis};
use crate::error::ConfigurationError;
use crate::selection::{SelectionMode, SelectionRule};
use crate::trigger::TriggerContext;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::info;

/// Role of a retained candidate on a gated axis.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Essential,
    Extra,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Essential => "essential",
            Role::Extra => "extra",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retained candidate on a gated axis.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanEntry {
    pub version: String,
    pub role: Role,
}

/// Retained values of one axis.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AxisValues {
    /// Axis without essentiality, passed through as bare versions.
    Plain(Vec<String>),

    /// Gated axis, each entry tagged with its role.
    Tagged(Vec<PlanEntry>),
}

/// One axis of a computed plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanAxis {
    pub name: String,
    pub values: AxisValues,
}

impl PlanAxis {
    pub fn len(&self) -> usize {
        match &self.values {
            AxisValues::Plain(versions) => versions.len(),
            AxisValues::Tagged(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version strings in order, with the role when the axis is gated.
    pub fn entries(&self) -> Vec<(&str, Option<Role>)> {
        match &self.values {
            AxisValues::Plain(versions) => versions.iter().map(|v| (v.as_str(), None)).collect(),
            AxisValues::Tagged(entries) => entries
                .iter()
                .map(|e| (e.version.as_str(), Some(e.role)))
                .collect(),
        }
    }
}

/// The computed matrix: axis name to retained entries, in declaration order.
///
/// Serializes as a JSON object keyed by axis name. Key order follows the
/// declaration, so identical inputs always serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPlan {
    mode: SelectionMode,
    axes: Vec<PlanAxis>,
}

impl TestPlan {
    /// Mode the plan was computed in.
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn axes(&self) -> &[PlanAxis] {
        &self.axes
    }

    pub fn axis(&self, name: &str) -> Option<&PlanAxis> {
        self.axes.iter().find(|axis| axis.name == name)
    }

    /// Number of cells in the full cross-product.
    pub fn cell_count(&self) -> usize {
        self.axes.iter().map(PlanAxis::len).product()
    }

    /// Serialize the plan to compact JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// SHA-256 hex digest of the compact JSON from [`TestPlan::to_json`].
    pub fn digest(&self) -> serde_json::Result<String> {
        let json = self.to_json()?;
        Ok(hex::encode(Sha256::digest(json.as_bytes())))
    }
}

impl Serialize for TestPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.axes.len()))?;
        for axis in &self.axes {
            map.serialize_entry(&axis.name, &axis.values)?;
        }
        map.end()
    }
}

/// Compute the test plan for a trigger.
///
/// Gated axes keep only their essential candidates in narrow mode and every
/// candidate in broad mode; their entries are tagged `essential` or `extra`.
/// Other axes pass through as plain version lists. The declaration is
/// validated first, so a plan is either returned whole or not at all.
pub fn compute_plan(
    axes: &[VersionAxis],
    context: &TriggerContext,
    rule: &SelectionRule,
) -> Result<TestPlan, ConfigurationError> {
    validate_axes(axes)?;

    let mode = SelectionMode::select(context, rule);
    let axes: Vec<PlanAxis> = axes.iter().map(|axis| plan_axis(axis, mode)).collect();
    let plan = TestPlan { mode, axes };

    info!(
        mode = %mode,
        label = rule.label(),
        reviewable = context.is_reviewable_change,
        axes = plan.axes.len(),
        cells = plan.cell_count(),
        "Computed test plan"
    );

    Ok(plan)
}

fn plan_axis(axis: &VersionAxis, mode: SelectionMode) -> PlanAxis {
    let values = if axis.gated {
        AxisValues::Tagged(
            axis.candidates
                .iter()
                .filter(|c| mode == SelectionMode::Broad || c.is_essential)
                .map(|c| PlanEntry {
                    version: c.version.clone(),
                    role: if c.is_essential {
                        Role::Essential
                    } else {
                        Role::Extra
                    },
                })
                .collect(),
        )
    } else {
        AxisValues::Plain(axis.candidates.iter().map(|c| c.version.clone()).collect())
    };

    PlanAxis {
        name: axis.name.clone(),
        values,
    }
}
