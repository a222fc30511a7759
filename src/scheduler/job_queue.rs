// src/scheduler/job_queue.rs

//! Pending jobs, one FIFO per queue name.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info};

use crate::errors::JobError;
use crate::model::JobSpec;

/// Jobs waiting for a node, grouped by queue.
///
/// Within a queue jobs leave in arrival order, except that a job whose
/// dispatch failed goes back to the front. There is no ordering across
/// queues beyond iterating queue names alphabetically.
#[derive(Debug, Clone)]
pub struct JobQueue {
    queues: BTreeMap<String, VecDeque<JobSpec>>,
    max_size: usize,
}

impl JobQueue {
    /// `max_size` bounds each individual queue.
    pub fn new(max_size: usize) -> Self {
        Self {
            queues: BTreeMap::new(),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Append a job to the back of its queue.
    pub fn add(&mut self, spec: JobSpec) -> Result<(), JobError> {
        let queue = spec.queue_name().to_string();
        let pending = self.queues.entry(queue.clone()).or_default();
        if pending.len() >= self.max_size {
            return Err(JobError::QueueFull(queue));
        }
        debug!(job_id = %spec.id(), queue = %queue, position = pending.len(), "job queued");
        pending.push_back(spec);
        Ok(())
    }

    /// Put a job back at the front of its queue.
    ///
    /// Never fails: a job that already held a place in line keeps it even if
    /// the queue filled up in the meantime.
    pub fn requeue(&mut self, spec: JobSpec) {
        let queue = spec.queue_name().to_string();
        debug!(job_id = %spec.id(), queue = %queue, "job requeued at front");
        self.queues.entry(queue).or_default().push_front(spec);
    }

    /// Take the next job from the first non-empty queue (by name).
    pub fn next(&mut self) -> Option<JobSpec> {
        self.queues.values_mut().find_map(VecDeque::pop_front)
    }

    /// Take the next job of `queue`.
    pub fn next_in(&mut self, queue: &str) -> Option<JobSpec> {
        self.queues.get_mut(queue).and_then(VecDeque::pop_front)
    }

    /// Look at the next job of `queue` without removing it.
    pub fn peek(&self, queue: &str) -> Option<&JobSpec> {
        self.queues.get(queue).and_then(VecDeque::front)
    }

    /// Remove a job that has not been dispatched yet.
    pub fn cancel(&mut self, job_id: &str) -> Option<JobSpec> {
        for pending in self.queues.values_mut() {
            if let Some(pos) = pending.iter().position(|s| s.id() == job_id) {
                info!(job_id, "pending job cancelled");
                return pending.remove(pos);
            }
        }
        None
    }

    /// Drop every pending job of `queue`, returning them.
    pub fn purge(&mut self, queue: &str) -> Vec<JobSpec> {
        let purged: Vec<JobSpec> = self
            .queues
            .get_mut(queue)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default();
        if !purged.is_empty() {
            info!(queue, purged = purged.len(), "queue purged");
        }
        purged
    }

    /// Pending jobs of `queue`, front first.
    pub fn queued_jobs(&self, queue: &str) -> Vec<JobSpec> {
        self.queues
            .get(queue)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of queues that currently hold at least one job.
    pub fn non_empty_queues(&self) -> Vec<String> {
        self.queues
            .iter()
            .filter(|(_, q)| !q.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.queues
            .values()
            .any(|q| q.iter().any(|s| s.id() == job_id))
    }

    /// Total pending jobs across all queues.
    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
