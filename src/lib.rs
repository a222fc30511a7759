// src/lib.rs

pub mod batch;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod model;
pub mod precondition;
pub mod resource;
pub mod runtime;
pub mod scheduler;
pub mod types;
pub mod workflow;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::batch::{BatchManager, LocalBatchBackend};
use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::engine::EngineRunner;
use crate::fs::RealFileSystem;
use crate::model::JobStatus;
use crate::precondition::PreconditionRegistry;
use crate::resource::Topology;
use crate::runtime::{ManagerCore, ManagerEvent, Runtime, RuntimeOptions};
use crate::scheduler::Scheduler;
use crate::workflow::{WorkflowEngine, WorkflowState};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and topology assembly
/// - the engine runner shared by jobs and workflows
/// - the resource manager runtime (scheduler + batch manager)
/// - the workflow engine
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let base_dir = config_root_dir(&config_path);
    let topology = Topology::load(&cfg, &RealFileSystem, &base_dir)?;

    if args.dry_run {
        print_dry_run(&cfg, &topology);
        return Ok(());
    }

    let runner = EngineRunner::new(cfg.engine.slots);

    // Room for every startup submission before the runtime starts reading.
    let (rt_tx, rt_rx) = mpsc::channel::<ManagerEvent>(cfg.job.len() + 64);

    let backend = LocalBatchBackend::new(runner.clone(), rt_tx.clone());
    let batch = Arc::new(
        BatchManager::new(backend, cfg.scheduler.dispatch_timeout())
            .with_probe(cfg.scheduler.probe_nodes),
    );

    let scheduler = Scheduler::new(
        Arc::clone(&topology.monitor),
        Arc::clone(&topology.queues),
    );
    let options = RuntimeOptions {
        exit_when_idle: args.once,
        retry_interval: cfg.scheduler.retry_interval(),
        retain_finished: cfg.scheduler.retain_finished,
    };
    let core = ManagerCore::new(scheduler, cfg.scheduler.max_queue_size, options);
    let runtime = Runtime::new(core, rt_rx, &rt_tx, batch);

    // Ctrl-C → graceful shutdown of both loops.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = shutdown_tx.send(true);
            let _ = tx.send(ManagerEvent::ShutdownRequested).await;
        });
    }

    // Seed configured jobs.
    let specs = cfg.job_specs();
    info!(jobs = specs.len(), "submitting configured jobs");
    for spec in specs {
        rt_tx.send(ManagerEvent::JobSubmitted { spec }).await?;
    }
    drop(rt_tx);

    // Start configured workflows.
    let mut workflows = WorkflowEngine::new(runner.clone(), PreconditionRegistry::builtin())
        .with_retention(cfg.engine.retain_finished);
    for (model, metadata) in cfg.workflow_models() {
        let id = workflows.start_workflow(model, metadata, None)?;
        debug!(instance_id = %id, "configured workflow started");
    }

    let runtime_handle = tokio::spawn(runtime.run());
    let workflow_handle = tokio::spawn(workflows.run(shutdown_rx, args.once));

    let reports = runtime_handle.await??;
    let instances = workflow_handle.await??;
    runner.shutdown();

    let mut unsuccessful = 0;
    for r in reports.iter() {
        info!(job_id = %r.job_id, queue = %r.queue, status = %r.status, node_id = ?r.node_id, retries = r.retries, "job summary");
        if r.status != JobStatus::Success {
            unsuccessful += 1;
        }
    }
    for i in instances.iter() {
        info!(instance_id = %i.instance_id, model = %i.model_id, state = %i.state, times_blocked = i.times_blocked, "workflow summary");
        if i.state != WorkflowState::Completed {
            unsuccessful += 1;
        }
    }

    if args.once && unsuccessful > 0 {
        warn!(unsuccessful, "not everything finished successfully");
        bail!("{unsuccessful} job(s) or workflow(s) did not complete successfully");
    }
    Ok(())
}

/// Directory that relative node sources and queue dirs are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "site/Jobwright.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Jobwright.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: topology, queues, jobs and workflows.
fn print_dry_run(cfg: &ConfigFile, topology: &Topology) {
    println!("jobwright dry-run");
    println!("  engine.slots = {}", cfg.engine.slots);
    println!(
        "  scheduler.dispatch_timeout_ms = {}",
        cfg.scheduler.dispatch_timeout_ms
    );
    println!("  scheduler.max_queue_size = {}", cfg.scheduler.max_queue_size);
    println!("  scheduler.probe_nodes = {}", cfg.scheduler.probe_nodes);
    println!();

    let nodes = topology.monitor.nodes();
    println!("nodes ({}):", nodes.len());
    for node in nodes.iter() {
        println!("  - {} url={} capacity={}", node.node_id, node.url, node.capacity);
    }

    let queues = topology.queues.queues();
    println!("queues ({}):", queues.len());
    for q in queues.iter() {
        let nodes = topology.queues.nodes_for_queue(q).unwrap_or(&[]);
        println!("  - {q}: {nodes:?}");
    }

    println!("jobs ({}):", cfg.job.len());
    for (name, job) in cfg.job.iter() {
        println!("  - {name}");
        println!("      cmd: {}", job.cmd);
        println!("      queue: {} load: {} priority: {}", job.queue, job.load, job.priority);
    }

    println!("workflows ({}):", cfg.workflow.len());
    for (name, wf) in cfg.workflow.iter() {
        println!("  - {name} (priority {})", wf.priority);
        for task in wf.tasks.iter() {
            println!("      task {}: {}", task.id, task.cmd);
            for pre in task.preconditions.iter() {
                println!("        precondition {} ({})", pre.id, pre.kind);
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
