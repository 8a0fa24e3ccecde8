//! Error types for plan computation and its loaders

use thiserror::Error;

/// A defect in the static axis declaration.
///
/// Always fatal: the declaration has to be fixed, nothing is retried and no
/// partial plan is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("No axes declared")]
    NoAxes,

    #[error("Axis at position {index} has an empty name")]
    UnnamedAxis { index: usize },

    #[error("Axis '{axis}' is declared more than once")]
    DuplicateAxis { axis: String },

    #[error("Axis '{axis}' exports environment variable {key} already used by another axis")]
    EnvKeyCollision { axis: String, key: String },

    #[error("Axis '{axis}' has no candidates")]
    EmptyAxis { axis: String },

    #[error("Axis '{axis}' has a candidate with an empty version")]
    EmptyVersion { axis: String },

    #[error("Axis '{axis}' lists version '{version}' more than once")]
    DuplicateVersion { axis: String, version: String },

    #[error("Axis '{axis}' declares essentiality but has no essential candidate")]
    NoEssentialCandidate { axis: String },
}

impl ConfigurationError {
    /// Name of the axis the defect was found on, if it belongs to one.
    pub fn axis(&self) -> Option<&str> {
        match self {
            ConfigurationError::NoAxes | ConfigurationError::UnnamedAxis { .. } => None,
            ConfigurationError::DuplicateAxis { axis }
            | ConfigurationError::EnvKeyCollision { axis, .. }
            | ConfigurationError::EmptyAxis { axis }
            | ConfigurationError::EmptyVersion { axis }
            | ConfigurationError::DuplicateVersion { axis, .. }
            | ConfigurationError::NoEssentialCandidate { axis } => Some(axis),
        }
    }
}

#[derive(Error, Debug)]
pub enum TestPlanError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Declaration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Trigger context unavailable: {0}")]
    Trigger(String),
}

/// Result type for testplan operations
pub type Result<T> = std::result::Result<T, TestPlanError>;
