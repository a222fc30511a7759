use std::fmt;

use crate::types::NodeId;

/// A compute host that jobs can be placed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNode {
    pub node_id: NodeId,
    /// `host:port` the node answers on.
    pub url: String,
    /// Hard ceiling on the load the node accepts.
    pub capacity: u32,
}

impl ResourceNode {
    pub fn new(node_id: impl Into<NodeId>, url: impl Into<String>, capacity: u32) -> Self {
        Self {
            node_id: node_id.into(),
            url: url.into(),
            capacity,
        }
    }
}

impl fmt::Display for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.node_id, self.url)
    }
}

/// Point-in-time load of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLoad {
    pub node: ResourceNode,
    pub load: u32,
}

impl NodeLoad {
    pub fn is_available(&self) -> bool {
        self.load < self.node.capacity
    }

    /// Whether a job of `load` units still fits on this node.
    pub fn fits(&self, load: u32) -> bool {
        self.load.saturating_add(load) <= self.node.capacity
    }
}
