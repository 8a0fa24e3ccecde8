//! Cross-product expansion of a plan into matrix cells.
//!
//! Runners with a native matrix feature consume the plan JSON directly.
//! Everything else iterates [`TestPlan::cells`].

use crate::plan::{Role, TestPlan};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Prefix of the environment variables a cell exports.
pub const ENV_PREFIX: &str = "TESTPLAN_";

/// One axis value bound in a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellBinding {
    pub axis: String,
    pub version: String,
    /// Present when the axis is gated.
    pub role: Option<Role>,
}

/// One element of the plan's cross-product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixCell {
    pub bindings: Vec<CellBinding>,
}

impl MatrixCell {
    /// Version bound for `axis`.
    pub fn version(&self, axis: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.axis == axis)
            .map(|b| b.version.as_str())
    }

    /// Whether every gated binding in the cell is essential.
    ///
    /// Cells on plans without gated axes count as essential.
    pub fn is_essential(&self) -> bool {
        self.bindings
            .iter()
            .all(|b| b.role.map_or(true, |r| r == Role::Essential))
    }

    /// `axis=version` pairs, comma separated.
    pub fn label(&self) -> String {
        self.bindings
            .iter()
            .map(|b| format!("{}={}", b.axis, b.version))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Environment variables describing this cell.
    ///
    /// `TESTPLAN_<AXIS>` holds the version; gated axes also export
    /// `TESTPLAN_<AXIS>_ROLE`.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let mut vars = Vec::with_capacity(self.bindings.len() * 2);
        for binding in &self.bindings {
            let key = env_key(&binding.axis);
            if let Some(role) = binding.role {
                vars.push((role_key(&key), role.to_string()));
            }
            vars.push((key, binding.version.clone()));
        }
        vars.sort();
        vars
    }
}

impl Serialize for MatrixCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a> {
            version: &'a str,
            role: Role,
        }

        let mut map = serializer.serialize_map(Some(self.bindings.len()))?;
        for binding in &self.bindings {
            match binding.role {
                Some(role) => map.serialize_entry(
                    &binding.axis,
                    &Tagged {
                        version: &binding.version,
                        role,
                    },
                )?,
                None => map.serialize_entry(&binding.axis, &binding.version)?,
            }
        }
        map.end()
    }
}

/// Variable holding an axis version. Names differing only in case or
/// punctuation fold to the same key; declarations reject such pairs.
pub(crate) fn env_key(axis: &str) -> String {
    let mut key = String::from(ENV_PREFIX);
    key.extend(axis.chars().map(|c| {
        if c.is_ascii_alphanumeric() {
            c.to_ascii_uppercase()
        } else {
            '_'
        }
    }));
    key
}

/// Variable holding the role of a gated axis.
pub(crate) fn role_key(env_key: &str) -> String {
    format!("{}_ROLE", env_key)
}

impl TestPlan {
    /// Enumerate the full cross-product, first axis outermost.
    pub fn cells(&self) -> Vec<MatrixCell> {
        let mut cells: Vec<Vec<CellBinding>> = vec![Vec::new()];

        for axis in self.axes() {
            let entries = axis.entries();
            let mut next = Vec::with_capacity(cells.len() * entries.len());
            for prefix in &cells {
                for (version, role) in &entries {
                    let mut bindings = prefix.clone();
                    bindings.push(CellBinding {
                        axis: axis.name.clone(),
                        version: version.to_string(),
                        role: *role,
                    });
                    next.push(bindings);
                }
            }
            cells = next;
        }

        cells
            .into_iter()
            .map(|bindings| MatrixCell { bindings })
            .collect()
    }
}
