//! Execution of one command for one matrix cell.

use crate::matrix::MatrixCell;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

/// Result of running the command for a cell.
#[derive(Debug, Clone)]
pub struct CellResult {
    /// Cell the command ran for.
    pub cell: MatrixCell,

    /// Exit code (0 = success, -1 when the process never produced one).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: String,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl CellResult {
    /// Whether this cell passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Result for a cell whose command could not be run to completion.
    pub fn errored(cell: MatrixCell, error: &anyhow::Error, duration_ms: u64) -> Self {
        Self {
            cell,
            exit_code: -1,
            stdout: String::new(),
            stderr: format!("{:#}", error),
            duration_ms,
            success: false,
        }
    }
}

/// Runs the opaque per-cell command.
pub struct CellRunner;

impl CellRunner {
    /// Execute `command` with the cell exported as environment variables.
    ///
    /// A `timeout_secs` of 0 disables the timeout. The child is killed when
    /// the timeout fires.
    pub async fn execute(
        cell: &MatrixCell,
        command: &[String],
        timeout_secs: u64,
    ) -> anyhow::Result<CellResult> {
        let start = Instant::now();

        let (exe, args) = match command.split_first() {
            Some(split) => split,
            None => anyhow::bail!("Cell {} has empty command", cell.label()),
        };

        debug!(cell = %cell.label(), command = ?command, "Spawning cell command");

        let child = Command::new(exe)
            .args(args)
            .envs(cell.env_vars())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow::anyhow!("Failed to spawn '{}': {}", exe, e))?;

        let output = if timeout_secs > 0 {
            tokio::time::timeout(
                std::time::Duration::from_secs(timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "Cell {} timed out after {} seconds",
                    cell.label(),
                    timeout_secs
                )
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok(CellResult {
            cell: cell.clone(),
            exit_code,
            stdout,
            stderr,
            duration_ms,
            success: output.status.success(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CellBinding;
    use crate::plan::Role;

    fn cell() -> MatrixCell {
        MatrixCell {
            bindings: vec![
                CellBinding {
                    axis: "rust".to_string(),
                    version: "1.70".to_string(),
                    role: Some(Role::Essential),
                },
                CellBinding {
                    axis: "runtime".to_string(),
                    version: "tokio".to_string(),
                    role: None,
                },
            ],
        }
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_cell_result_passed() {
        let result = CellResult {
            cell: cell(),
            exit_code: 0,
            stdout: "".to_string(),
            stderr: "".to_string(),
            duration_ms: 100,
            success: true,
        };
        assert!(result.passed());
    }

    #[test]
    fn test_cell_result_errored() {
        let err = anyhow::anyhow!("spawn failed");
        let result = CellResult::errored(cell(), &err, 5);
        assert!(!result.passed());
        assert_eq!(result.exit_code, -1);
        assert_eq!(result.stderr, "spawn failed");
    }

    #[tokio::test]
    async fn test_execute_exports_cell_env() {
        let result = CellRunner::execute(
            &cell(),
            &sh("echo $TESTPLAN_RUST/$TESTPLAN_RUST_ROLE/$TESTPLAN_RUNTIME"),
            60,
        )
        .await
        .expect("execute failed");

        assert!(result.passed());
        assert_eq!(result.stdout.trim(), "1.70/essential/tokio");
    }

    #[tokio::test]
    async fn test_execute_failing_command() {
        let result = CellRunner::execute(&cell(), &sh("exit 3"), 60)
            .await
            .expect("execute failed");
        assert!(!result.success);
        assert_eq!(result.exit_code, 3);
    }

    #[tokio::test]
    async fn test_execute_empty_command() {
        let err = CellRunner::execute(&cell(), &[], 60).await.unwrap_err();
        assert!(err.to_string().contains("empty command"));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let err = CellRunner::execute(&cell(), &sh("sleep 5"), 1)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
