// src/resource/mod.rs

//! Compute topology: nodes, their load, and the queues that route to them.
//!
//! - [`node`]: the `ResourceNode` value type.
//! - [`monitor`]: `ResourceMonitor`, node registry + per-node load.
//! - [`queue_manager`]: `QueueManager`, queue name → node ids.
//!
//! [`Topology::load`] assembles both from a validated config, resolving
//! node sources and queue directories relative to the config file.

pub mod monitor;
pub mod node;
pub mod queue_manager;

use std::path::Path;
use std::sync::Arc;

use crate::config::ConfigFile;
use crate::errors::{JobwrightError, Result};
use crate::fs::FileSystem;

pub use monitor::ResourceMonitor;
pub use node::{NodeLoad, ResourceNode};
pub use queue_manager::QueueManager;

/// Shared handles to the resource monitor and queue manager.
#[derive(Debug, Clone)]
pub struct Topology {
    pub monitor: Arc<ResourceMonitor>,
    pub queues: Arc<QueueManager>,
}

impl Topology {
    pub fn new(monitor: ResourceMonitor, queues: QueueManager) -> Self {
        Self {
            monitor: Arc::new(monitor),
            queues: Arc::new(queues),
        }
    }

    /// Load nodes and queues described by `cfg`.
    ///
    /// References that validation had to defer (queues naming nodes from
    /// external sources, jobs naming queues from queue directories) are
    /// checked here.
    pub fn load(cfg: &ConfigFile, fs: &dyn FileSystem, base_dir: &Path) -> Result<Self> {
        let monitor = ResourceMonitor::load(fs, base_dir, &cfg.node, &cfg.monitor.sources)?;
        let queues = QueueManager::load(fs, base_dir, &cfg.queue, &cfg.queues.dirs, &monitor)?;
        let topology = Self::new(monitor, queues);
        topology.check_jobs(cfg)?;
        Ok(topology)
    }

    fn check_jobs(&self, cfg: &ConfigFile) -> Result<()> {
        for (name, job) in cfg.job.iter() {
            let nodes = self.queues.nodes_for_queue(&job.queue)?;
            let max_capacity = nodes
                .iter()
                .filter_map(|n| self.monitor.node_by_id(n).ok())
                .map(|n| n.capacity)
                .max()
                .unwrap_or(0);
            if job.load > max_capacity {
                return Err(JobwrightError::ConfigError(format!(
                    "job '{}' has load {} but the largest node in queue '{}' has capacity {}",
                    name, job.load, job.queue, max_capacity
                )));
            }
        }
        Ok(())
    }
}
