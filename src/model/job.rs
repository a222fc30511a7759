// src/model/job.rs

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::metadata::Metadata;
use crate::types::{JobId, Priority};

/// Lifecycle of a job inside the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting in the pending queue for a node.
    Queued,
    /// A node has been reserved; dispatch is in progress.
    Scheduled,
    /// The batch backend accepted the job.
    Executing,
    Success,
    Failure,
    /// Removed from the pending queue before it was dispatched.
    Killed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure | JobStatus::Killed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Executing => "executing",
            JobStatus::Success => "success",
            JobStatus::Failure => "failure",
            JobStatus::Killed => "killed",
        };
        f.write_str(s)
    }
}

/// Static description of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    /// Queue that decides which nodes may run this job.
    pub queue_name: String,
    /// Load units this job occupies on its node while it runs.
    pub load: u32,
    pub priority: Priority,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    /// New job with a fresh id, load 1 and normal priority.
    pub fn new(name: impl Into<String>, queue_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            queue_name: queue_name.into(),
            load: 1,
            priority: Priority::default(),
            submitted_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_load(mut self, load: u32) -> Self {
        self.load = load;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Input handed to whatever executes the job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobInput {
    /// Shell command for backends that run commands (the local backend).
    pub command: Option<String>,
    pub metadata: Metadata,
}

impl JobInput {
    pub fn command(cmd: impl Into<String>) -> Self {
        Self {
            command: Some(cmd.into()),
            metadata: Metadata::new(),
        }
    }
}

/// A submitted unit of work: the job descriptor plus its input.
///
/// Cloning is cheap; both halves are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub job: Arc<Job>,
    pub input: Arc<JobInput>,
}

impl JobSpec {
    pub fn new(job: Job, input: JobInput) -> Self {
        Self {
            job: Arc::new(job),
            input: Arc::new(input),
        }
    }

    pub fn id(&self) -> &str {
        &self.job.id
    }

    pub fn queue_name(&self) -> &str {
        &self.job.queue_name
    }

    pub fn load(&self) -> u32 {
        self.job.load
    }
}
