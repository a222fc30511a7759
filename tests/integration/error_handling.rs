// tests/integration/error_handling.rs

use std::io::Write;

use tempfile::NamedTempFile;
use jobwright::config::load_and_validate;
use jobwright::errors::JobwrightError;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn zero_slots_is_a_config_error() {
    let file = config_file(
        r#"
[engine]
slots = 0

[node.n1]
url = "127.0.0.1:9000"
capacity = 1

[queue.q]
nodes = ["n1"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(JobwrightError::ConfigError(msg)) => assert!(msg.contains("slots"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn job_on_unknown_queue_is_a_config_error() {
    let file = config_file(
        r#"
[node.n1]
url = "127.0.0.1:9000"
capacity = 1

[queue.q]
nodes = ["n1"]

[job.lost]
cmd = "true"
queue = "elsewhere"
"#,
    );

    match load_and_validate(file.path()) {
        Err(JobwrightError::ConfigError(msg)) => {
            assert!(msg.contains("unknown queue"), "{msg}");
            assert!(msg.contains("elsewhere"), "{msg}");
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn queue_on_unknown_node_is_a_config_error() {
    let file = config_file(
        r#"
[node.n1]
url = "127.0.0.1:9000"
capacity = 1

[queue.q]
nodes = ["n1", "ghost"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(JobwrightError::ConfigError(msg)) => assert!(msg.contains("ghost"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn duplicate_task_ids_are_rejected() {
    let file = config_file(
        r#"
[node.n1]
url = "127.0.0.1:9000"
capacity = 1

[queue.q]
nodes = ["n1"]

[[workflow.w.task]]
id = "a"
cmd = "true"

[[workflow.w.task]]
id = "a"
cmd = "false"
"#,
    );

    match load_and_validate(file.path()) {
        Err(JobwrightError::ConfigError(msg)) => assert!(msg.contains("more than once"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn out_of_range_priority_is_a_toml_error() {
    let file = config_file(
        r#"
[node.n1]
url = "127.0.0.1:9000"
capacity = 1

[queue.q]
nodes = ["n1"]

[job.j]
cmd = "true"
queue = "q"
priority = 42.0
"#,
    );

    assert!(matches!(
        load_and_validate(file.path()),
        Err(JobwrightError::TomlError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_and_validate(dir.path().join("Jobwright.toml"));
    assert!(matches!(result, Err(JobwrightError::IoError(_))));
}
