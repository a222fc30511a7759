// src/resource/queue_manager.rs

//! Named queues mapping to the nodes that may serve them.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::QueueConfig;
use crate::errors::QueueManagerError;
use crate::fs::{resolve_source, FileSystem};
use crate::resource::monitor::ResourceMonitor;
use crate::types::NodeId;

#[derive(Debug, Deserialize)]
struct QueueSourceFile {
    #[serde(default)]
    queue: BTreeMap<String, QueueConfig>,
}

/// Read-only map of queue name → ordered node ids.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct QueueManager {
    queues: BTreeMap<String, Vec<NodeId>>,
}

impl QueueManager {
    /// Build from `(queue, nodes)` pairs, checking every node against the
    /// monitor.
    pub fn from_queues<I, S>(queues: I, monitor: &ResourceMonitor) -> Result<Self, QueueManagerError>
    where
        I: IntoIterator<Item = (S, Vec<NodeId>)>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (name, nodes) in queues {
            insert_queue(&mut map, name.into(), nodes)?;
        }
        let qm = Self { queues: map };
        qm.check_nodes(monitor)?;
        Ok(qm)
    }

    /// Build from inline `[queue.<name>]` tables plus every `*.toml` file
    /// found in `dirs`.
    ///
    /// A queue name seen twice, whether inline or in a directory, is
    /// ambiguous and rejected.
    pub fn load(
        fs: &dyn FileSystem,
        base_dir: &Path,
        inline: &BTreeMap<String, QueueConfig>,
        dirs: &[String],
        monitor: &ResourceMonitor,
    ) -> Result<Self, QueueManagerError> {
        let mut map = BTreeMap::new();

        for (name, qc) in inline.iter() {
            insert_queue(&mut map, name.clone(), qc.nodes.clone())?;
        }

        for dir in dirs {
            let dir_path = resolve_source(base_dir, dir);
            if !fs.is_dir(&dir_path) {
                return Err(QueueManagerError::Source {
                    source_uri: dir.clone(),
                    reason: "not a directory".to_string(),
                });
            }
            let entries = fs.read_dir(&dir_path).map_err(|e| QueueManagerError::Source {
                source_uri: dir.clone(),
                reason: format!("{e:#}"),
            })?;

            for path in entries
                .into_iter()
                .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            {
                let shown = path.display().to_string();
                debug!(file = %shown, "loading queue file");

                let contents = fs
                    .read_to_string(&path)
                    .map_err(|e| QueueManagerError::Source {
                        source_uri: shown.clone(),
                        reason: format!("{e:#}"),
                    })?;
                let file: QueueSourceFile =
                    toml::from_str(&contents).map_err(|e| QueueManagerError::Source {
                        source_uri: shown.clone(),
                        reason: e.to_string(),
                    })?;

                for (name, qc) in file.queue {
                    insert_queue(&mut map, name, qc.nodes)?;
                }
            }
        }

        let qm = Self { queues: map };
        qm.check_nodes(monitor)?;
        info!(queues = qm.queues.len(), "queue manager initialised");
        Ok(qm)
    }

    /// Nodes that may serve `queue`, in declaration order.
    pub fn nodes_for_queue(&self, queue: &str) -> Result<&[NodeId], QueueManagerError> {
        self.queues
            .get(queue)
            .map(Vec::as_slice)
            .ok_or_else(|| QueueManagerError::UnknownQueue(queue.to_string()))
    }

    /// All queue names, sorted.
    pub fn queues(&self) -> Vec<String> {
        self.queues.keys().cloned().collect()
    }

    pub fn contains(&self, queue: &str) -> bool {
        self.queues.contains_key(queue)
    }

    /// Queues that include `node_id`, sorted.
    pub fn queues_for_node(&self, node_id: &str) -> Vec<String> {
        self.queues
            .iter()
            .filter(|(_, nodes)| nodes.iter().any(|n| n == node_id))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn check_nodes(&self, monitor: &ResourceMonitor) -> Result<(), QueueManagerError> {
        for (queue, nodes) in self.queues.iter() {
            for node_id in nodes {
                if !monitor.contains(node_id) {
                    return Err(QueueManagerError::UnknownNode {
                        queue: queue.clone(),
                        node_id: node_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn insert_queue(
    map: &mut BTreeMap<String, Vec<NodeId>>,
    name: String,
    nodes: Vec<NodeId>,
) -> Result<(), QueueManagerError> {
    if nodes.is_empty() {
        return Err(QueueManagerError::EmptyQueue(name));
    }
    if map.contains_key(&name) {
        return Err(QueueManagerError::Ambiguous(name));
    }

    // Keep declaration order, drop repeats.
    let mut ordered: Vec<NodeId> = Vec::with_capacity(nodes.len());
    for n in nodes {
        if !ordered.contains(&n) {
            ordered.push(n);
        }
    }
    map.insert(name, ordered);
    Ok(())
}
