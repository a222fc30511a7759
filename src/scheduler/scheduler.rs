// src/scheduler/scheduler.rs

//! Least-loaded node selection with atomic load reservation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{JobwrightError, MonitorError, Result};
use crate::model::JobSpec;
use crate::resource::{NodeLoad, QueueManager, ResourceMonitor, ResourceNode};
use crate::scheduler::step::ScheduleStep;
use crate::types::{JobId, NodeId};

/// Where a scheduled job holds its reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub node_id: NodeId,
    pub load: u32,
}

/// Places jobs on the least-loaded eligible node of their queue.
///
/// `schedule` may be called from many threads at once. Each reservation is
/// decided under the chosen node's own lock, so no node ever exceeds its
/// capacity; the assignment table has its own lock and is only touched
/// after a reservation succeeded.
#[derive(Debug)]
pub struct Scheduler {
    monitor: Arc<ResourceMonitor>,
    queues: Arc<QueueManager>,
    assignments: Mutex<HashMap<JobId, Assignment>>,
}

impl Scheduler {
    pub fn new(monitor: Arc<ResourceMonitor>, queues: Arc<QueueManager>) -> Self {
        Self {
            monitor,
            queues,
            assignments: Mutex::new(HashMap::new()),
        }
    }

    pub fn monitor(&self) -> &Arc<ResourceMonitor> {
        &self.monitor
    }

    pub fn queue_manager(&self) -> &Arc<QueueManager> {
        &self.queues
    }

    /// Try once to reserve capacity for `spec`.
    ///
    /// Returns `Ok(true)` when load was reserved and the assignment recorded,
    /// `Ok(false)` when no node of the queue has room. Never blocks waiting
    /// for capacity.
    pub fn schedule(&self, spec: &JobSpec) -> Result<bool> {
        Ok(self.step_schedule(spec)?.is_assigned())
    }

    /// The node `schedule` would try first, without reserving anything.
    pub fn node_available(&self, spec: &JobSpec) -> Result<Option<ResourceNode>> {
        Ok(self
            .candidates(spec)?
            .into_iter()
            .next()
            .map(|nl| nl.node))
    }

    /// Rich variant of [`schedule`](Self::schedule) reporting the chosen node.
    pub fn step_schedule(&self, spec: &JobSpec) -> Result<ScheduleStep> {
        let job_id = spec.id();
        if let Some(existing) = self.assignment_of(job_id) {
            return Err(JobwrightError::Scheduler(format!(
                "job {} already holds a reservation on node '{}'",
                job_id, existing.node_id
            )));
        }

        let candidates = self.candidates(spec)?;
        let queue_nodes = self.queue_nodes(spec)?.len();

        for candidate in candidates {
            let node_id = candidate.node.node_id.as_str();
            // Another caller may have filled this node since the snapshot.
            if !self.monitor.try_assign_load(node_id, spec.load())? {
                debug!(job_id, node_id, "lost reservation race; trying next node");
                continue;
            }

            {
                let mut assignments = self.assignments.lock();
                if let Some(existing) = assignments.get(job_id) {
                    // Raced with a concurrent schedule of the same job.
                    let held_on = existing.node_id.clone();
                    drop(assignments);
                    self.monitor.reduce_load(node_id, spec.load())?;
                    return Err(JobwrightError::Scheduler(format!(
                        "job {} already holds a reservation on node '{}'",
                        job_id, held_on
                    )));
                }
                assignments.insert(
                    job_id.to_string(),
                    Assignment {
                        node_id: node_id.to_string(),
                        load: spec.load(),
                    },
                );
            }

            let load_after = self.monitor.load_of(node_id)?;
            info!(
                job_id,
                queue = spec.queue_name(),
                node_id,
                load = spec.load(),
                load_after,
                capacity = candidate.node.capacity,
                "job scheduled"
            );
            return Ok(ScheduleStep::Assigned {
                node: candidate.node,
                load_after,
            });
        }

        debug!(job_id, queue = spec.queue_name(), "no node has capacity");
        Ok(ScheduleStep::NoCapacity { queue_nodes })
    }

    /// Free the reservation held by `job_id`.
    ///
    /// Returns the node that was released, or `None` if the job held no
    /// reservation (already released, or never scheduled).
    pub fn release(&self, job_id: &str) -> Result<Option<NodeId>> {
        let Some(assignment) = self.assignments.lock().remove(job_id) else {
            debug!(job_id, "release without reservation; ignoring");
            return Ok(None);
        };
        self.monitor
            .reduce_load(&assignment.node_id, assignment.load)?;
        info!(job_id, node_id = %assignment.node_id, load = assignment.load, "reservation released");
        Ok(Some(assignment.node_id))
    }

    pub fn assignment_of(&self, job_id: &str) -> Option<Assignment> {
        self.assignments.lock().get(job_id).cloned()
    }

    /// Number of jobs currently holding a reservation.
    pub fn assigned_count(&self) -> usize {
        self.assignments.lock().len()
    }

    fn queue_nodes(&self, spec: &JobSpec) -> Result<&[NodeId]> {
        self.queues
            .nodes_for_queue(spec.queue_name())
            .map_err(|e| JobwrightError::Scheduler(e.to_string()))
    }

    /// Nodes of the job's queue that can take its load, least loaded first,
    /// ties broken by node id.
    fn candidates(&self, spec: &JobSpec) -> Result<Vec<NodeLoad>> {
        let mut candidates = Vec::new();
        for node_id in self.queue_nodes(spec)? {
            match self.monitor.node_load(node_id) {
                Ok(nl) if nl.fits(spec.load()) => candidates.push(nl),
                Ok(_) => {}
                Err(MonitorError::NodeNotFound(id)) => {
                    warn!(node_id = %id, queue = spec.queue_name(), "queue names a node the monitor does not know");
                }
                Err(e) => return Err(e.into()),
            }
        }
        candidates.sort_by(|a, b| {
            a.load
                .cmp(&b.load)
                .then_with(|| a.node.node_id.cmp(&b.node.node_id))
        });
        Ok(candidates)
    }
}
