//! Pass/fail gate over fan-out results.

use crate::runner::CellResult;

/// Gate evaluation verdict.
#[derive(Debug, Clone)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// Violations that caused failure (empty if passed).
    pub violations: Vec<String>,

    /// Whether any failing cell was on the essential path.
    pub essential_failed: bool,

    /// Summary message.
    pub message: String,
}

/// Matrix gate evaluation rules.
pub struct MatrixGate;

impl MatrixGate {
    /// Evaluate whether every cell passed.
    ///
    /// Gate rule:
    /// - Every cell must exit with code 0
    /// - Each failing cell becomes one violation
    /// - Violations on essential cells are listed before those on extra cells
    pub fn evaluate(results: &[CellResult]) -> GateVerdict {
        let mut essential = Vec::new();
        let mut extra = Vec::new();

        for result in results.iter().filter(|r| !r.passed()) {
            let violation = if result.exit_code == -1 && !result.stderr.is_empty() {
                format!(
                    "Cell '{}' failed: {}",
                    result.cell.label(),
                    result.stderr.lines().next().unwrap_or_default()
                )
            } else {
                format!(
                    "Cell '{}' exited with code {}",
                    result.cell.label(),
                    result.exit_code
                )
            };

            if result.cell.is_essential() {
                essential.push(violation);
            } else {
                extra.push(violation);
            }
        }

        let essential_failed = !essential.is_empty();
        let mut violations = essential;
        violations.extend(extra);

        let passed = violations.is_empty();
        let message = if passed {
            format!("All {} cell(s) passed", results.len())
        } else if essential_failed {
            format!(
                "Gate failed with {} violation(s), including essential cells",
                violations.len()
            )
        } else {
            format!("Gate failed with {} violation(s)", violations.len())
        };

        GateVerdict {
            passed,
            violations,
            essential_failed,
            message,
        }
    }
}
