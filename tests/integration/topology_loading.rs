// tests/integration/topology_loading.rs

use std::fs;
use std::path::Path;

use jobwright::config::load_and_validate;
use jobwright::errors::{JobwrightError, MonitorError, QueueManagerError};
use jobwright::fs::RealFileSystem;
use jobwright::fs::mock::MockFileSystem;
use jobwright::resource::{ResourceMonitor, Topology};
use jobwright_test_utils::builders::ConfigFileBuilder;

fn write(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

const MAIN: &str = r#"
[monitor]
sources = ["nodes.toml"]

[queues]
dirs = ["queues.d"]

[node.local]
url = "127.0.0.1:9000"
capacity = 1

[job.render]
cmd = "true"
queue = "gpu"
load = 4
"#;

#[test]
fn loads_node_sources_and_queue_dirs_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Jobwright.toml", MAIN);
    write(
        dir.path(),
        "nodes.toml",
        r#"
[node.gpu-1]
url = "10.0.0.1:7000"
capacity = 4

[node.gpu-2]
url = "10.0.0.2:7000"
capacity = 8
"#,
    );
    write(dir.path(), "queues.d/gpu.toml", "[queue.gpu]\nnodes = [\"gpu-2\", \"gpu-1\"]\n");
    write(dir.path(), "queues.d/cpu.toml", "[queue.cpu]\nnodes = [\"local\"]\n");
    write(dir.path(), "queues.d/README.md", "not a queue file");

    let cfg = load_and_validate(dir.path().join("Jobwright.toml")).unwrap();
    let topo = Topology::load(&cfg, &RealFileSystem, dir.path()).unwrap();

    let ids: Vec<_> = topo.monitor.nodes().into_iter().map(|n| n.node_id).collect();
    assert_eq!(ids, vec!["gpu-1", "gpu-2", "local"]);
    assert_eq!(topo.queues.queues(), vec!["cpu", "gpu"]);
    assert_eq!(topo.queues.nodes_for_queue("gpu").unwrap(), ["gpu-2", "gpu-1"]);
    assert_eq!(topo.queues.queues_for_node("local"), vec!["cpu"]);
}

#[test]
fn job_heavier_than_external_nodes_fails_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Jobwright.toml", MAIN);
    write(dir.path(), "nodes.toml", "[node.gpu-1]\nurl = \"h:1\"\ncapacity = 2\n");
    write(dir.path(), "queues.d/gpu.toml", "[queue.gpu]\nnodes = [\"gpu-1\"]\n");

    let cfg = load_and_validate(dir.path().join("Jobwright.toml")).unwrap();
    match Topology::load(&cfg, &RealFileSystem, dir.path()) {
        Err(JobwrightError::ConfigError(msg)) => assert!(msg.contains("render"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn queue_defined_in_two_files_is_ambiguous() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Jobwright.toml", MAIN);
    write(dir.path(), "nodes.toml", "[node.gpu-1]\nurl = \"h:1\"\ncapacity = 4\n");
    write(dir.path(), "queues.d/a.toml", "[queue.gpu]\nnodes = [\"gpu-1\"]\n");
    write(dir.path(), "queues.d/b.toml", "[queue.gpu]\nnodes = [\"local\"]\n");

    let cfg = load_and_validate(dir.path().join("Jobwright.toml")).unwrap();
    assert!(matches!(
        Topology::load(&cfg, &RealFileSystem, dir.path()),
        Err(JobwrightError::QueueManager(QueueManagerError::Ambiguous(q))) if q == "gpu"
    ));
}

#[test]
fn unreachable_and_malformed_sources_are_reported() {
    let fs = MockFileSystem::new();
    fs.add_file("/site/bad.toml", "[node.x\nurl = ");

    let missing = ResourceMonitor::load(
        &fs,
        Path::new("/site"),
        &Default::default(),
        &["file:///site/missing.toml".to_string()],
    )
    .unwrap_err();
    assert!(matches!(missing, MonitorError::SourceUnreachable { .. }), "{missing}");

    let malformed = ResourceMonitor::load(
        &fs,
        Path::new("/site"),
        &Default::default(),
        &["bad.toml".to_string()],
    )
    .unwrap_err();
    assert!(matches!(malformed, MonitorError::MalformedSource { .. }), "{malformed}");
}

#[test]
fn duplicate_node_across_sources_is_rejected() {
    let fs = MockFileSystem::new();
    fs.add_file("/site/a.toml", "[node.n1]\nurl = \"h:1\"\ncapacity = 1\n");
    fs.add_file("/site/b.toml", "[node.n1]\nurl = \"h:2\"\ncapacity = 1\n");

    let err = ResourceMonitor::load(
        &fs,
        Path::new("/site"),
        &Default::default(),
        &["a.toml".to_string(), "b.toml".to_string()],
    )
    .unwrap_err();
    assert!(matches!(err, MonitorError::DuplicateNode(id) if id == "n1"));
}

#[test]
fn inline_topology_from_builder() {
    let cfg = ConfigFileBuilder::new()
        .with_node("a", 2)
        .with_node("b", 3)
        .with_queue("q", &["a", "b"])
        .build();
    let topo = Topology::load(&cfg, &MockFileSystem::new(), Path::new("/")).unwrap();

    assert_eq!(topo.monitor.available_nodes().len(), 2);
    assert!(topo.monitor.try_assign_load("a", 2).unwrap());
    assert!(!topo.monitor.try_assign_load("a", 1).unwrap());
    assert_eq!(topo.monitor.available_nodes().len(), 1);

    topo.monitor.reduce_load("a", 5).unwrap();
    assert_eq!(topo.monitor.load_of("a").unwrap(), 0);
}
