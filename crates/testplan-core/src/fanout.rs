//! Fan-out of a command over every cell of a plan.

use crate::matrix::MatrixCell;
use crate::plan::TestPlan;
use crate::runner::{CellResult, CellRunner};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Settings for a fan-out run.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Command to execute per cell (first element is executable).
    pub command: Vec<String>,

    /// Maximum number of cells running at once. Values below 1 are raised
    /// to 1.
    pub max_parallel: usize,

    /// Per-cell timeout in seconds, 0 for none.
    pub timeout_secs: u64,
}

impl FanoutConfig {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            max_parallel: 1,
            timeout_secs: 0,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Result of running a command over the whole matrix.
#[derive(Debug, Clone)]
pub struct FanoutResult {
    /// Whether every cell passed.
    pub success: bool,

    /// Per-cell results, in cell order.
    pub cells: Vec<CellResult>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// Digest of the plan that was expanded.
    pub plan_digest: String,
}

impl FanoutResult {
    /// Number of cells that passed.
    pub fn passed_count(&self) -> usize {
        self.cells.iter().filter(|c| c.passed()).count()
    }

    /// Number of cells that failed.
    pub fn failed_count(&self) -> usize {
        self.cells.iter().filter(|c| !c.passed()).count()
    }
}

/// Matrix fan-out orchestrator.
pub struct Fanout;

impl Fanout {
    /// Run the configured command once per cell of `plan`.
    ///
    /// Cells run concurrently up to `max_parallel`. A cell whose command
    /// cannot be spawned or times out is recorded as failed and the
    /// remaining cells still run.
    pub async fn run(plan: &TestPlan, config: &FanoutConfig) -> anyhow::Result<FanoutResult> {
        if config.command.is_empty() {
            anyhow::bail!("Fan-out command is empty");
        }

        let start = Instant::now();
        let plan_digest = plan.digest().context("Failed to digest plan")?;
        let cells = plan.cells();
        let total = cells.len();
        let max_parallel = config.max_parallel.max(1);

        info!(
            plan_digest = %&plan_digest[..12],
            mode = %plan.mode(),
            cells = total,
            max_parallel,
            "Starting matrix fan-out"
        );

        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let command = Arc::new(config.command.clone());
        let timeout_secs = config.timeout_secs;
        let mut tasks = JoinSet::new();

        for (index, cell) in cells.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let command = Arc::clone(&command);
            tasks.spawn(async move {
                let result = run_cell(semaphore, cell, &command, timeout_secs).await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<CellResult>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined.context("Cell task panicked")?;
            slots[index] = Some(result);
        }
        let results: Vec<CellResult> = slots.into_iter().flatten().collect();

        let duration_ms = start.elapsed().as_millis() as u64;
        let success = results.iter().all(CellResult::passed);

        let result = FanoutResult {
            success,
            cells: results,
            duration_ms,
            plan_digest,
        };

        if success {
            info!(cells = total, duration_ms, "Matrix fan-out completed successfully");
        } else {
            info!(
                passed = result.passed_count(),
                failed = result.failed_count(),
                duration_ms,
                "Matrix fan-out failed"
            );
        }

        Ok(result)
    }
}

async fn run_cell(
    semaphore: Arc<Semaphore>,
    cell: MatrixCell,
    command: &[String],
    timeout_secs: u64,
) -> CellResult {
    let start = Instant::now();
    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return CellResult::errored(cell, &anyhow::Error::new(e), 0),
    };

    info!(cell = %cell.label(), "Executing cell");

    match CellRunner::execute(&cell, command, timeout_secs).await {
        Ok(result) => {
            if !result.passed() {
                warn!(cell = %cell.label(), exit_code = result.exit_code, "Cell failed");
            }
            result
        }
        Err(e) => {
            warn!(cell = %cell.label(), error = %e, "Cell execution error");
            let duration_ms = start.elapsed().as_millis() as u64;
            CellResult::errored(cell, &e, duration_ms)
        }
    }
}
