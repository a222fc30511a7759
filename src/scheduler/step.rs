// src/scheduler/step.rs

use crate::resource::ResourceNode;

/// Structured result of a single [`Scheduler`](super::Scheduler) attempt.
///
/// The boolean `schedule()` is a thin wrapper around this; the runtime uses
/// the richer form to learn which node it must dispatch to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleStep {
    /// Load was reserved on `node`.
    Assigned {
        node: ResourceNode,
        /// Node load right after the reservation.
        load_after: u32,
    },
    /// No node of the queue can take the job right now.
    NoCapacity {
        /// Nodes in the queue that were considered.
        queue_nodes: usize,
    },
}

impl ScheduleStep {
    pub fn is_assigned(&self) -> bool {
        matches!(self, ScheduleStep::Assigned { .. })
    }

    pub fn node(&self) -> Option<&ResourceNode> {
        match self {
            ScheduleStep::Assigned { node, .. } => Some(node),
            ScheduleStep::NoCapacity { .. } => None,
        }
    }
}
