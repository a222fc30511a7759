// src/errors.rs

//! Crate-wide error types.
//!
//! Each concern gets its own `thiserror` enum so callers can match on the
//! failure they care about; [`JobwrightError`] folds them together for the
//! public API. A scheduling miss or a failed precondition is *not* an error:
//! those are reported as `false`.

use thiserror::Error;

use crate::types::{InstanceId, JobId, NodeId};

/// Resource topology could not be loaded or queried.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("node source '{source_uri}' is unreachable: {reason}")]
    SourceUnreachable { source_uri: String, reason: String },

    #[error("node source '{source_uri}' is malformed: {reason}")]
    MalformedSource { source_uri: String, reason: String },

    #[error("node '{0}' is defined more than once")]
    DuplicateNode(NodeId),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("node '{node_id}' has invalid capacity {capacity} (must be >= 1)")]
    InvalidCapacity { node_id: NodeId, capacity: u32 },
}

/// Queue configuration is missing or inconsistent.
#[derive(Error, Debug)]
pub enum QueueManagerError {
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    #[error("queue '{0}' is defined more than once")]
    Ambiguous(String),

    #[error("queue '{queue}' references unknown node '{node_id}'")]
    UnknownNode { queue: String, node_id: NodeId },

    #[error("queue '{0}' has no nodes")]
    EmptyQueue(String),

    #[error("queue source '{source_uri}' could not be read: {reason}")]
    Source { source_uri: String, reason: String },
}

/// A job could not be dispatched or executed.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("dispatch of job {job_id} to node '{node_id}' timed out after {timeout_ms}ms")]
    DispatchTimeout {
        job_id: JobId,
        node_id: NodeId,
        timeout_ms: u64,
    },

    #[error("node '{node_id}' is unreachable; job {job_id} not dispatched: {reason}")]
    NodeUnreachable {
        job_id: JobId,
        node_id: NodeId,
        reason: String,
    },

    #[error("backend rejected job {job_id} on node '{node_id}': {reason}")]
    Rejected {
        job_id: JobId,
        node_id: NodeId,
        reason: String,
    },

    #[error("job queue '{0}' is full")]
    QueueFull(String),

    #[error("job not found: {0}")]
    NotFound(JobId),
}

/// Internal fault of the local engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no open slots ({used}/{total} in use)")]
    NoOpenSlots { used: usize, total: usize },

    #[error("engine runner has been shut down")]
    RunnerClosed,

    #[error("illegal workflow transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    #[error("workflow instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("workflow model not found: {0}")]
    ModelNotFound(String),
}

#[derive(Error, Debug)]
pub enum JobwrightError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Queue manager error: {0}")]
    QueueManager(#[from] QueueManagerError),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, JobwrightError>;
