// src/config/validate.rs

use std::collections::HashSet;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{JobwrightError, Result};
use crate::precondition::PreconditionRegistry;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::JobwrightError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_topology(cfg)?;
    validate_engine_and_scheduler(cfg)?;
    validate_nodes(cfg)?;
    validate_queues(cfg)?;
    validate_jobs(cfg)?;
    validate_workflows(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> JobwrightError {
    JobwrightError::ConfigError(msg.into())
}

fn ensure_has_topology(cfg: &RawConfigFile) -> Result<()> {
    if cfg.node.is_empty() && cfg.monitor.sources.is_empty() {
        return Err(config_error(
            "config must define at least one [node.<id>] section or a [monitor].sources entry",
        ));
    }
    if cfg.queue.is_empty() && cfg.queues.dirs.is_empty() {
        return Err(config_error(
            "config must define at least one [queue.<name>] section or a [queues].dirs entry",
        ));
    }
    Ok(())
}

fn validate_engine_and_scheduler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.engine.slots == 0 {
        return Err(config_error("[engine].slots must be >= 1 (got 0)"));
    }
    if cfg.scheduler.dispatch_timeout_ms == 0 {
        return Err(config_error(
            "[scheduler].dispatch_timeout_ms must be >= 1 (got 0)",
        ));
    }
    if cfg.scheduler.max_queue_size == 0 {
        return Err(config_error("[scheduler].max_queue_size must be >= 1 (got 0)"));
    }
    if cfg.scheduler.retry_interval_ms == 0 {
        return Err(config_error(
            "[scheduler].retry_interval_ms must be >= 1 (got 0)",
        ));
    }
    Ok(())
}

fn validate_nodes(cfg: &RawConfigFile) -> Result<()> {
    for (id, node) in cfg.node.iter() {
        if node.capacity == 0 {
            return Err(config_error(format!(
                "node '{}' must have capacity >= 1",
                id
            )));
        }
        if node.url.trim().is_empty() {
            return Err(config_error(format!("node '{}' has an empty url", id)));
        }
    }
    Ok(())
}

fn validate_queues(cfg: &RawConfigFile) -> Result<()> {
    // Node references can only be checked here when every node is inline;
    // otherwise the queue manager checks them against the loaded monitor.
    let all_nodes_inline = cfg.monitor.sources.is_empty();

    for (name, queue) in cfg.queue.iter() {
        if queue.nodes.is_empty() {
            return Err(config_error(format!("queue '{}' has no nodes", name)));
        }
        if all_nodes_inline {
            for node in queue.nodes.iter() {
                if !cfg.node.contains_key(node) {
                    return Err(config_error(format!(
                        "queue '{}' references unknown node '{}'",
                        name, node
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_jobs(cfg: &RawConfigFile) -> Result<()> {
    let all_queues_inline = cfg.queues.dirs.is_empty();

    for (name, job) in cfg.job.iter() {
        if job.load == 0 {
            return Err(config_error(format!("job '{}' must have load >= 1", name)));
        }
        if job.cmd.trim().is_empty() {
            return Err(config_error(format!("job '{}' has an empty cmd", name)));
        }
        if !all_queues_inline {
            continue;
        }
        let Some(queue) = cfg.queue.get(&job.queue) else {
            return Err(config_error(format!(
                "job '{}' references unknown queue '{}'",
                name, job.queue
            )));
        };

        // A job heavier than every node of its queue could never be placed.
        let max_capacity = queue
            .nodes
            .iter()
            .filter_map(|n| cfg.node.get(n))
            .map(|n| n.capacity)
            .max();
        if let Some(max_capacity) = max_capacity {
            if job.load > max_capacity {
                return Err(config_error(format!(
                    "job '{}' has load {} but the largest node in queue '{}' has capacity {}",
                    name, job.load, job.queue, max_capacity
                )));
            }
        }
    }
    Ok(())
}

fn validate_workflows(cfg: &RawConfigFile) -> Result<()> {
    let registry = PreconditionRegistry::builtin();

    for (name, wf) in cfg.workflow.iter() {
        if wf.tasks.is_empty() {
            return Err(config_error(format!(
                "workflow '{}' must contain at least one [[workflow.{}.task]]",
                name, name
            )));
        }

        let mut seen = HashSet::new();
        for task in wf.tasks.iter() {
            if !seen.insert(task.id.as_str()) {
                return Err(config_error(format!(
                    "workflow '{}' defines task '{}' more than once",
                    name, task.id
                )));
            }
            for pre in task.preconditions.iter() {
                registry.build(pre).map_err(|e| {
                    config_error(format!(
                        "workflow '{}' task '{}': {}",
                        name, task.id, e
                    ))
                })?;
            }
        }
    }
    Ok(())
}
