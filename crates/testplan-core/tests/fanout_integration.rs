//! Integration tests for matrix fan-out over a computed plan.

use testplan_core::{
    compute_plan, Fanout, FanoutConfig, MatrixGate, SelectionRule, TestPlan, TriggerContext,
    VersionAxis, VersionCandidate,
};

fn plan(context: TriggerContext) -> TestPlan {
    let axes = vec![
        VersionAxis::gated(
            "rust",
            vec![
                VersionCandidate::essential("1.70"),
                VersionCandidate::new("stable"),
            ],
        ),
        VersionAxis::plain("runtime", ["tokio", "smol"]),
    ];
    compute_plan(&axes, &context, &SelectionRule::new("ci:full-matrix")).expect("plan failed")
}

fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Test: every cell runs and results keep cell order
#[tokio::test]
async fn test_fanout_runs_every_cell_in_order() {
    let plan = plan(TriggerContext::direct());
    // Earlier cells sleep longer so completion order differs from cell order.
    let config = FanoutConfig::new(sh(
        r#"if [ "$TESTPLAN_RUST" = "1.70" ]; then sleep 0.3; fi; echo "$TESTPLAN_RUST $TESTPLAN_RUNTIME""#,
    ))
    .with_max_parallel(4)
    .with_timeout_secs(30);

    let result = Fanout::run(&plan, &config).await.expect("fan-out failed");

    assert!(result.success);
    assert_eq!(result.passed_count(), 4);
    assert_eq!(result.plan_digest, plan.digest().unwrap());

    let outputs: Vec<String> = result
        .cells
        .iter()
        .map(|c| c.stdout.trim().to_string())
        .collect();
    assert_eq!(
        outputs,
        vec!["1.70 tokio", "1.70 smol", "stable tokio", "stable smol"]
    );
}

/// Test: narrow mode only runs essential cells
#[tokio::test]
async fn test_fanout_narrow_mode() {
    let plan = plan(TriggerContext::reviewable_change(["docs"]));
    let config = FanoutConfig::new(sh("echo $TESTPLAN_RUST_ROLE")).with_max_parallel(2);

    let result = Fanout::run(&plan, &config).await.expect("fan-out failed");

    assert_eq!(result.cells.len(), 2);
    assert!(result.cells.iter().all(|c| c.stdout.trim() == "essential"));
}

/// Test: a failing extra cell fails the gate without failing the essential path
#[tokio::test]
async fn test_fanout_failure_reaches_gate() {
    let plan = plan(TriggerContext::direct());
    let config = FanoutConfig::new(sh(r#"[ "$TESTPLAN_RUST" != "stable" ]"#)).with_max_parallel(1);

    let result = Fanout::run(&plan, &config).await.expect("fan-out failed");
    assert!(!result.success);
    assert_eq!(result.failed_count(), 2);

    let verdict = MatrixGate::evaluate(&result.cells);
    assert!(!verdict.passed);
    assert!(!verdict.essential_failed);
    assert_eq!(verdict.violations.len(), 2);
    assert!(verdict.violations[0].contains("rust=stable"));
}

/// Test: an unspawnable command is recorded per cell instead of aborting
#[tokio::test]
async fn test_fanout_spawn_error_recorded() {
    let plan = plan(TriggerContext::reviewable_change(Vec::<String>::new()));
    let config = FanoutConfig::new(vec!["/nonexistent/testplan-command".to_string()]);

    let result = Fanout::run(&plan, &config).await.expect("fan-out failed");
    assert_eq!(result.cells.len(), 2);
    assert!(result.cells.iter().all(|c| c.exit_code == -1));

    let verdict = MatrixGate::evaluate(&result.cells);
    assert!(verdict.essential_failed);
}

/// Test: an empty command is rejected up front
#[tokio::test]
async fn test_fanout_empty_command() {
    let plan = plan(TriggerContext::direct());
    let err = Fanout::run(&plan, &FanoutConfig::new(Vec::new()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("empty"));
}
