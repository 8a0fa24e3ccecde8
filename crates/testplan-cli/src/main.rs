//! testplan - CI test-plan generator
//!
//! The `testplan` command computes the version matrix a CI run should cover.
//!
//! ## Commands
//!
//! - `plan`: Compute the plan and print it as JSON (and to `$GITHUB_OUTPUT`)
//! - `check`: Validate an axis declaration
//! - `expand`: List the cells of the plan's cross-product
//! - `run`: Run a command once per cell and gate on the results

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use testplan_core::{
    compute_plan, Declaration, Fanout, FanoutConfig, MatrixGate, SelectionRule, TestPlan,
    TriggerContext,
};

#[derive(Parser)]
#[command(name = "testplan")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CI test-plan generator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the test plan and print it as JSON
    Plan {
        #[command(flatten)]
        input: PlanInput,

        /// Output name written to $GITHUB_OUTPUT
        #[arg(long, default_value = "matrix")]
        output_name: String,

        /// File to append `<output-name>=<plan>` to
        #[arg(long, env = "GITHUB_OUTPUT")]
        github_output: Option<PathBuf>,

        /// Pretty-print the plan on stdout
        #[arg(long)]
        pretty: bool,
    },

    /// Validate an axis declaration
    Check {
        /// Axis declaration file
        #[arg(short, long, env = "TESTPLAN_AXES", default_value = "testplan.toml")]
        axes: PathBuf,
    },

    /// List every cell of the plan's cross-product
    Expand {
        #[command(flatten)]
        input: PlanInput,

        /// Print cells as a JSON array instead of one line per cell
        #[arg(long)]
        json_cells: bool,
    },

    /// Run a command once per cell
    Run {
        #[command(flatten)]
        input: PlanInput,

        /// Maximum number of cells running at once
        #[arg(short = 'j', long, default_value = "1")]
        max_parallel: usize,

        /// Per-cell timeout in seconds (0 = none)
        #[arg(long, default_value = "0")]
        timeout_secs: u64,

        /// Command to run for each cell
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

/// Inputs shared by every command that computes a plan.
#[derive(Args, Debug, Clone)]
struct PlanInput {
    /// Axis declaration file
    #[arg(short, long, env = "TESTPLAN_AXES", default_value = "testplan.toml")]
    axes: PathBuf,

    /// Label that forces the full matrix (overrides the declaration)
    #[arg(short, long, env = "TESTPLAN_LABEL")]
    label: Option<String>,

    /// Triggering event name (e.g. push, pull_request)
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    event_name: Option<String>,

    /// Path to the triggering event payload JSON
    #[arg(long, env = "GITHUB_EVENT_PATH")]
    event_path: Option<PathBuf>,

    /// Treat the trigger as a reviewable change regardless of event name
    #[arg(long)]
    reviewable: bool,

    /// Labels on the change (comma-separated), replacing payload labels
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    testplan_core::init_tracing(cli.json, testplan_core::telemetry::default_level(cli.verbose));

    match cli.command {
        Commands::Plan {
            input,
            output_name,
            github_output,
            pretty,
        } => cmd_plan(&input, &output_name, github_output.as_deref(), pretty),
        Commands::Check { axes } => cmd_check(&axes),
        Commands::Expand { input, json_cells } => cmd_expand(&input, json_cells),
        Commands::Run {
            input,
            max_parallel,
            timeout_secs,
            command,
        } => cmd_run(&input, max_parallel, timeout_secs, command).await,
    }
}

/// Resolve the trigger context from flags and the CI environment.
fn resolve_trigger(input: &PlanInput) -> Result<TriggerContext> {
    let mut context = if input.reviewable {
        TriggerContext::reviewable_change(Vec::<String>::new())
    } else {
        match input.event_name.as_deref() {
            Some(event_name) => {
                TriggerContext::from_github_event_file(event_name, input.event_path.as_deref())
                    .context("Failed to read trigger event")?
            }
            None => TriggerContext::direct(),
        }
    };

    if let Some(labels) = &input.labels {
        if context.is_reviewable_change {
            context.labels = labels.clone();
        }
    }

    Ok(context)
}

/// Load the declaration and compute the plan.
fn build_plan(input: &PlanInput) -> Result<TestPlan> {
    let declaration = Declaration::load(&input.axes)
        .with_context(|| format!("Failed to load axis declaration {:?}", input.axes))?;
    let rule = match &input.label {
        Some(label) => SelectionRule::new(label.clone()),
        None => declaration.selection_rule(),
    };
    let context = resolve_trigger(input)?;

    let plan = compute_plan(&declaration.axes, &context, &rule)
        .with_context(|| format!("Invalid axis declaration {:?}", input.axes))?;
    Ok(plan)
}

/// Append `name=value` to a GitHub Actions output file.
fn write_github_output(path: &Path, name: &str, value: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {:?}", path))?;
    writeln!(file, "{}={}", name, value)?;
    Ok(())
}

fn cmd_plan(
    input: &PlanInput,
    output_name: &str,
    github_output: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let plan = build_plan(input)?;
    let compact = plan.to_json()?;

    if let Some(path) = github_output {
        write_github_output(path, output_name, &compact)?;
        info!(output = output_name, path = %path.display(), "Wrote plan to GitHub output");
    }

    if pretty {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        println!("{}", compact);
    }
    Ok(())
}

fn cmd_check(axes: &Path) -> Result<()> {
    let declaration = Declaration::load(axes)
        .with_context(|| format!("Failed to load axis declaration {:?}", axes))?;
    declaration
        .validate()
        .with_context(|| format!("Invalid axis declaration {:?}", axes))?;

    println!("Declaration {:?} is valid", axes);
    for axis in &declaration.axes {
        let essential = axis.essential_candidates().count();
        if axis.gated {
            println!(
                "  {} ({} candidates, {} essential)",
                axis.name,
                axis.candidates.len(),
                essential
            );
        } else {
            println!("  {} ({} candidates)", axis.name, axis.candidates.len());
        }
    }
    println!("Selection label: {}", declaration.selection_rule().label());
    Ok(())
}

fn cmd_expand(input: &PlanInput, json_cells: bool) -> Result<()> {
    let plan = build_plan(input)?;
    let cells = plan.cells();

    if json_cells {
        println!("{}", serde_json::to_string(&cells)?);
    } else {
        for cell in &cells {
            println!("{}", cell.label());
        }
    }
    Ok(())
}

async fn cmd_run(
    input: &PlanInput,
    max_parallel: usize,
    timeout_secs: u64,
    command: Vec<String>,
) -> Result<()> {
    let plan = build_plan(input)?;
    let config = FanoutConfig::new(command)
        .with_max_parallel(max_parallel)
        .with_timeout_secs(timeout_secs);

    println!("Running {} cell(s) in {} mode", plan.cell_count(), plan.mode());
    println!("Plan digest: {}", plan.digest()?);
    println!();

    let result = Fanout::run(&plan, &config)
        .await
        .context("Matrix fan-out failed to run")?;

    println!("Duration: {}ms", result.duration_ms);
    for cell_result in &result.cells {
        let status = if cell_result.passed() { "✓" } else { "✗" };
        println!(
            "  {} {} ({}ms, exit code: {})",
            status,
            cell_result.cell.label(),
            cell_result.duration_ms,
            cell_result.exit_code
        );
    }

    let verdict = MatrixGate::evaluate(&result.cells);
    println!();
    println!("{}", verdict.message);
    for violation in &verdict.violations {
        println!("  - {}", violation);
    }

    if !verdict.passed {
        anyhow::bail!("{}", verdict.message);
    }
    Ok(())
}
