// src/resource/monitor.rs

//! Resource monitor: the static node topology plus live load accounting.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::errors::MonitorError;
use crate::fs::{resolve_source, FileSystem};
use crate::resource::node::{NodeLoad, ResourceNode};
use crate::types::NodeId;

/// Layout of an external node source file.
#[derive(Debug, Deserialize)]
struct NodeSourceFile {
    #[serde(default)]
    node: BTreeMap<String, NodeConfig>,
}

#[derive(Debug)]
struct NodeEntry {
    node: ResourceNode,
    /// Guarded per node so unrelated nodes never contend.
    load: Mutex<u32>,
}

/// Tracks every registered [`ResourceNode`] and its current load.
///
/// The set of nodes is fixed at construction; only the per-node load changes
/// afterwards, and only under that node's own lock.
#[derive(Debug)]
pub struct ResourceMonitor {
    nodes: BTreeMap<NodeId, NodeEntry>,
}

impl ResourceMonitor {
    /// Build a monitor from an explicit node list.
    pub fn from_nodes(nodes: impl IntoIterator<Item = ResourceNode>) -> Result<Self, MonitorError> {
        let mut map = BTreeMap::new();
        for node in nodes {
            register(&mut map, node)?;
        }
        info!(nodes = map.len(), "resource monitor initialised");
        Ok(Self { nodes: map })
    }

    /// Build a monitor from inline `[node.<id>]` tables plus any number of
    /// external node source files.
    ///
    /// A source that cannot be read or parsed fails the whole load; nothing
    /// is retried.
    pub fn load(
        fs: &dyn FileSystem,
        base_dir: &Path,
        inline: &BTreeMap<String, NodeConfig>,
        sources: &[String],
    ) -> Result<Self, MonitorError> {
        let mut map = BTreeMap::new();

        for (id, nc) in inline.iter() {
            register(&mut map, ResourceNode::new(id.clone(), nc.url.clone(), nc.capacity))?;
        }

        for uri in sources {
            let path = resolve_source(base_dir, uri);
            debug!(source = %uri, path = ?path, "loading node source");

            let contents = fs
                .read_to_string(&path)
                .map_err(|e| MonitorError::SourceUnreachable {
                    source_uri: uri.clone(),
                    reason: format!("{e:#}"),
                })?;
            let file: NodeSourceFile =
                toml::from_str(&contents).map_err(|e| MonitorError::MalformedSource {
                    source_uri: uri.clone(),
                    reason: e.to_string(),
                })?;

            if file.node.is_empty() {
                warn!(source = %uri, "node source defines no nodes");
            }
            for (id, nc) in file.node {
                register(&mut map, ResourceNode::new(id, nc.url, nc.capacity))?;
            }
        }

        info!(nodes = map.len(), sources = sources.len(), "resource monitor initialised");
        Ok(Self { nodes: map })
    }

    /// All nodes, ordered by node id.
    pub fn nodes(&self) -> Vec<ResourceNode> {
        self.nodes.values().map(|e| e.node.clone()).collect()
    }

    pub fn node_by_id(&self, node_id: &str) -> Result<ResourceNode, MonitorError> {
        self.entry(node_id).map(|e| e.node.clone())
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn load_of(&self, node_id: &str) -> Result<u32, MonitorError> {
        Ok(*self.entry(node_id)?.load.lock())
    }

    /// Load snapshot of a single node.
    pub fn node_load(&self, node_id: &str) -> Result<NodeLoad, MonitorError> {
        let entry = self.entry(node_id)?;
        Ok(NodeLoad {
            node: entry.node.clone(),
            load: *entry.load.lock(),
        })
    }

    /// Load snapshot of every node, ordered by node id.
    ///
    /// Each value is read under its own lock; the snapshot as a whole is not
    /// atomic across nodes.
    pub fn snapshot(&self) -> Vec<NodeLoad> {
        self.nodes
            .values()
            .map(|e| NodeLoad {
                node: e.node.clone(),
                load: *e.load.lock(),
            })
            .collect()
    }

    /// Nodes whose load is still below capacity.
    pub fn available_nodes(&self) -> Vec<ResourceNode> {
        self.snapshot()
            .into_iter()
            .filter(NodeLoad::is_available)
            .map(|nl| nl.node)
            .collect()
    }

    /// Add `load` to the node if it still fits under capacity.
    ///
    /// The capacity check and the increment happen under the node's lock,
    /// so concurrent callers can never push a node past its capacity.
    pub fn try_assign_load(&self, node_id: &str, load: u32) -> Result<bool, MonitorError> {
        let entry = self.entry(node_id)?;
        let mut current = entry.load.lock();
        if current.saturating_add(load) > entry.node.capacity {
            return Ok(false);
        }
        *current += load;
        debug!(node_id, load, new_load = *current, capacity = entry.node.capacity, "assigned load");
        Ok(true)
    }

    /// Remove `load` from the node, clamping at zero.
    pub fn reduce_load(&self, node_id: &str, load: u32) -> Result<(), MonitorError> {
        let entry = self.entry(node_id)?;
        let mut current = entry.load.lock();
        if *current < load {
            warn!(
                node_id,
                current = *current,
                load,
                "reducing more load than assigned; clamping to zero"
            );
        }
        *current = current.saturating_sub(load);
        debug!(node_id, load, new_load = *current, "reduced load");
        Ok(())
    }

    fn entry(&self, node_id: &str) -> Result<&NodeEntry, MonitorError> {
        self.nodes
            .get(node_id)
            .ok_or_else(|| MonitorError::NodeNotFound(node_id.to_string()))
    }
}

fn register(map: &mut BTreeMap<NodeId, NodeEntry>, node: ResourceNode) -> Result<(), MonitorError> {
    if node.capacity == 0 {
        return Err(MonitorError::InvalidCapacity {
            node_id: node.node_id,
            capacity: 0,
        });
    }
    if map.contains_key(&node.node_id) {
        return Err(MonitorError::DuplicateNode(node.node_id));
    }
    debug!(node_id = %node.node_id, url = %node.url, capacity = node.capacity, "registered node");
    map.insert(
        node.node_id.clone(),
        NodeEntry {
            node,
            load: Mutex::new(0),
        },
    );
    Ok(())
}
