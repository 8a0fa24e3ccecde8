//! testplan core - CI version-matrix planning
//!
//! Provides the plan computer that:
//! - Reads a static table of version axes
//! - Picks broad or narrow mode from the triggering event
//! - Filters gated axes down to essential candidates and tags roles
//! - Expands the plan into matrix cells and fans a command out over them

pub mod declaration;
pub mod error;
pub mod fanout;
pub mod gate;
pub mod matrix;
pub mod plan;
pub mod runner;
pub mod selection;
pub mod telemetry;
pub mod trigger;

// Re-export key types
pub use declaration::{Declaration, VersionAxis, VersionCandidate, DEFAULT_SELECTION_LABEL};
pub use error::{ConfigurationError, Result, TestPlanError};
pub use fanout::{Fanout, FanoutConfig, FanoutResult};
pub use gate::{GateVerdict, MatrixGate};
pub use matrix::{CellBinding, MatrixCell};
pub use plan::{compute_plan, AxisValues, PlanAxis, PlanEntry, Role, TestPlan};
pub use runner::{CellResult, CellRunner};
pub use selection::{should_include_all, SelectionMode, SelectionRule};
pub use telemetry::init_tracing;
pub use trigger::TriggerContext;

/// testplan version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
