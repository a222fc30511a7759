// src/runtime/job_table.rs

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info};

use crate::model::{JobSpec, JobStatus};
use crate::runtime::JobOutcome;
use crate::types::{JobId, NodeId};

#[derive(Debug, Clone)]
struct JobRecord {
    /// Dropped once the job is terminal.
    spec: Option<JobSpec>,
    queue: String,
    status: JobStatus,
    node_id: Option<NodeId>,
    /// Dispatches that failed and were retried.
    retries: u32,
    last_error: Option<String>,
}

/// Snapshot of one job for callers outside the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: JobId,
    pub queue: String,
    pub status: JobStatus,
    /// Node of the last successful reservation.
    pub node_id: Option<NodeId>,
    pub retries: u32,
    pub last_error: Option<String>,
}

/// Status of the jobs the runtime is handling plus the most recently
/// finished ones.
///
/// A terminal job keeps only its report row; at most `retain_finished` of
/// those are kept, oldest evicted first.
#[derive(Debug, Clone)]
pub struct JobTable {
    jobs: BTreeMap<JobId, JobRecord>,
    /// Terminal jobs in the order they finished.
    finished: VecDeque<JobId>,
    retain_finished: usize,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self::with_retention(usize::MAX)
    }

    pub fn with_retention(retain_finished: usize) -> Self {
        Self {
            jobs: BTreeMap::new(),
            finished: VecDeque::new(),
            retain_finished,
        }
    }

    pub fn insert(&mut self, spec: JobSpec) {
        let job_id = spec.id().to_string();
        self.finished.retain(|id| *id != job_id);
        self.jobs.insert(
            job_id,
            JobRecord {
                queue: spec.queue_name().to_string(),
                spec: Some(spec),
                status: JobStatus::Queued,
                node_id: None,
                retries: 0,
                last_error: None,
            },
        );
    }

    pub fn status_of(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.get(job_id).map(|r| r.status)
    }

    /// Spec of a job that is not terminal yet.
    pub fn spec_of(&self, job_id: &str) -> Option<&JobSpec> {
        self.jobs.get(job_id).and_then(|r| r.spec.as_ref())
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Whether every known job reached a terminal status.
    pub fn all_terminal(&self) -> bool {
        self.jobs.values().all(|r| r.status.is_terminal())
    }

    pub fn mark_scheduled(&mut self, job_id: &str, node_id: &str) {
        if let Some(r) = self.jobs.get_mut(job_id) {
            r.status = JobStatus::Scheduled;
            r.node_id = Some(node_id.to_string());
        }
    }

    /// Move a scheduled job to executing; later transitions win over this
    /// one, so a job that already finished stays finished.
    pub fn mark_executing(&mut self, job_id: &str) {
        if let Some(r) = self.jobs.get_mut(job_id) {
            if r.status == JobStatus::Scheduled {
                r.status = JobStatus::Executing;
            }
        }
    }

    /// Put a job whose dispatch failed back into `Queued`.
    ///
    /// Returns `false` if the job was not waiting on a dispatch.
    pub fn mark_retry(&mut self, job_id: &str, reason: &str) -> bool {
        match self.jobs.get_mut(job_id) {
            Some(r) if r.status == JobStatus::Scheduled => {
                r.status = JobStatus::Queued;
                r.retries += 1;
                r.last_error = Some(reason.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn mark_finished(&mut self, job_id: &str, outcome: &JobOutcome) {
        if let Some(r) = self.jobs.get_mut(job_id) {
            let status = match outcome {
                JobOutcome::Success => JobStatus::Success,
                JobOutcome::Failure(reason) => {
                    r.last_error = Some(reason.clone());
                    JobStatus::Failure
                }
            };
            info!(job_id, %status, "job finished");
            self.make_terminal(job_id, status);
        }
    }

    pub fn mark_failed(&mut self, job_id: &str, reason: impl Into<String>) {
        if let Some(r) = self.jobs.get_mut(job_id) {
            r.last_error = Some(reason.into());
            self.make_terminal(job_id, JobStatus::Failure);
        }
    }

    pub fn mark_killed(&mut self, job_id: &str) {
        self.make_terminal(job_id, JobStatus::Killed);
    }

    /// Forget every terminal job. Returns how many were removed.
    pub fn prune_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|_, r| !r.status.is_terminal());
        self.finished.clear();
        before - self.jobs.len()
    }

    fn make_terminal(&mut self, job_id: &str, status: JobStatus) {
        let Some(r) = self.jobs.get_mut(job_id) else {
            return;
        };
        let was_terminal = r.status.is_terminal();
        r.status = status;
        r.spec = None;
        if was_terminal {
            return;
        }

        self.finished.push_back(job_id.to_string());
        while self.finished.len() > self.retain_finished {
            let Some(oldest) = self.finished.pop_front() else {
                break;
            };
            self.jobs.remove(&oldest);
            debug!(job_id = %oldest, "finished job evicted");
        }
    }

    /// Every job, ordered by id.
    pub fn report(&self) -> Vec<JobReport> {
        self.jobs
            .iter()
            .map(|(id, r)| JobReport {
                job_id: id.clone(),
                queue: r.queue.clone(),
                status: r.status,
                node_id: r.node_id.clone(),
                retries: r.retries,
                last_error: r.last_error.clone(),
            })
            .collect()
    }
}
