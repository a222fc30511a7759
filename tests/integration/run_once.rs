// tests/integration/run_once.rs

use std::fs;
use std::path::Path;

use jobwright::cli::CliArgs;
use jobwright_test_utils::{init_tracing, with_timeout};

fn args(config: &Path, dry_run: bool) -> CliArgs {
    CliArgs {
        config: config.display().to_string(),
        once: true,
        log_level: None,
        dry_run,
    }
}

const TOPOLOGY: &str = r#"
[engine]
slots = 2

[scheduler]
retry_interval_ms = 10

[node.local]
url = "127.0.0.1:9000"
capacity = 2

[queue.default]
nodes = ["local"]
"#;

#[tokio::test]
async fn once_mode_runs_jobs_and_workflows_to_completion() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let config = dir.path().join("Jobwright.toml");
    fs::write(
        &config,
        format!(
            r#"{TOPOLOGY}
[job.a]
cmd = "test \"$JOBWRIGHT_QUEUE\" = default"
queue = "default"

[job.b]
cmd = "touch {marker}"
queue = "default"
load = 2

[job.c]
cmd = "true"
queue = "default"

[[workflow.ingest.task]]
id = "fetch"
cmd = "test -n \"$JOBWRIGHT_INSTANCE_ID\""

[[workflow.ingest.task]]
id = "store"
cmd = "true"
"#,
            marker = marker.display()
        ),
    )
    .unwrap();

    with_timeout(jobwright::run(args(&config, false)))
        .await
        .unwrap();
    assert!(marker.exists());
}

#[tokio::test]
async fn once_mode_reports_failed_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("Jobwright.toml");
    fs::write(
        &config,
        format!("{TOPOLOGY}\n[job.broken]\ncmd = \"exit 7\"\nqueue = \"default\"\n"),
    )
    .unwrap();

    let err = with_timeout(jobwright::run(args(&config, false)))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("did not complete"), "{err:#}");
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let config = dir.path().join("Jobwright.toml");
    fs::write(
        &config,
        format!(
            "{TOPOLOGY}\n[job.touch]\ncmd = \"touch {}\"\nqueue = \"default\"\n",
            marker.display()
        ),
    )
    .unwrap();

    jobwright::run(args(&config, true)).await.unwrap();
    assert!(!marker.exists());
}
