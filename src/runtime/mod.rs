// src/runtime/mod.rs

//! Resource manager runtime.
//!
//! Jobs flow in as [`ManagerEvent`]s. The pure [`core::ManagerCore`] owns
//! the scheduler, the pending job queue and the job table and turns each
//! event into [`ManagerCommand`]s; the async [`shell::Runtime`] reads the
//! event channel, runs those commands against the batch manager and feeds
//! the results back in as further events.

use std::fmt;
use std::time::Duration;

use crate::engine::TaskOutcome;
use crate::model::JobSpec;
use crate::types::{JobId, NodeId};

pub mod core;
pub mod event_handlers;
pub mod job_table;
pub mod shell;

pub use self::core::ManagerCore;
pub use event_handlers::{ManagerCommand, ManagerStep};
pub use job_table::{JobReport, JobTable};
pub use shell::Runtime;

/// How a dispatched job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure(String),
}

impl From<TaskOutcome> for JobOutcome {
    fn from(outcome: TaskOutcome) -> Self {
        match outcome {
            TaskOutcome::Success => JobOutcome::Success,
            TaskOutcome::Failed(reason) => JobOutcome::Failure(reason),
            TaskOutcome::Panicked => JobOutcome::Failure("task panicked".to_string()),
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::Success => f.write_str("success"),
            JobOutcome::Failure(reason) => write!(f, "failure: {reason}"),
        }
    }
}

/// Options shared by the core and the shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Stop once every submitted job is terminal and nothing is pending
    /// (used for `--once`).
    pub exit_when_idle: bool,
    /// How often jobs that found no capacity are tried again.
    pub retry_interval: Duration,
    /// Finished jobs kept for reporting.
    pub retain_finished: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            exit_when_idle: false,
            retry_interval: Duration::from_millis(250),
            retain_finished: 1_000,
        }
    }
}

/// Events flowing into the runtime from callers, the shell and backends.
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    /// A new job to place.
    JobSubmitted { spec: JobSpec },
    /// The backend accepted a job.
    JobDispatched { job_id: JobId, node_id: NodeId },
    /// The backend could not take a job; it goes back to the front of its
    /// queue.
    DispatchFailed { job_id: JobId, reason: String },
    /// A dispatched job finished.
    JobCompleted { job_id: JobId, outcome: JobOutcome },
    /// Remove a job that is still pending.
    CancelRequested { job_id: JobId },
    /// Periodic re-probe of pending jobs.
    RetryTick,
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}
