// src/batch/backend.rs

//! Pluggable batch backend abstraction.
//!
//! The resource manager runtime talks to a `BatchBackend` rather than to
//! processes directly, so tests can swap in fakes that complete, fail or
//! hang on demand while production uses [`LocalBatchBackend`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::engine::{EngineRunner, ShellTask, TaskOutcome};
use crate::errors::JobError;
use crate::model::JobSpec;
use crate::resource::ResourceNode;
use crate::runtime::{JobOutcome, ManagerEvent};

/// Future returned by [`BatchBackend::dispatch`].
pub type DispatchFuture<'a> = Pin<Box<dyn Future<Output = Result<(), JobError>> + Send + 'a>>;

/// Something that can accept a job for execution on a node.
pub trait BatchBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Hand `spec` to `node`.
    ///
    /// Resolves once the backend has *accepted* the job, not when the job
    /// finishes. Completion is reported separately through a
    /// [`ManagerEvent::JobCompleted`].
    fn dispatch(&self, spec: JobSpec, node: ResourceNode) -> DispatchFuture<'_>;
}

/// Runs each job's command on the shared [`EngineRunner`].
///
/// Acceptance means a runner slot was obtained; waiting for that slot counts
/// against the dispatch timeout.
#[derive(Debug, Clone)]
pub struct LocalBatchBackend {
    runner: EngineRunner,
    events: mpsc::Sender<ManagerEvent>,
}

impl LocalBatchBackend {
    pub fn new(runner: EngineRunner, events: mpsc::Sender<ManagerEvent>) -> Self {
        Self { runner, events }
    }

    pub fn runner(&self) -> &EngineRunner {
        &self.runner
    }
}

impl BatchBackend for LocalBatchBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn dispatch(&self, spec: JobSpec, node: ResourceNode) -> DispatchFuture<'_> {
        let runner = self.runner.clone();
        let events = self.events.clone();

        Box::pin(async move {
            let job_id = spec.id().to_string();
            let Some(cmd) = spec.input.command.clone() else {
                return Err(JobError::Rejected {
                    job_id,
                    node_id: node.node_id,
                    reason: "job has no command".to_string(),
                });
            };

            let task = ShellTask::new(job_id.clone(), cmd)
                .env("JOBWRIGHT_JOB_ID", job_id.as_str())
                .env("JOBWRIGHT_QUEUE", spec.queue_name())
                .env("JOBWRIGHT_NODE_ID", node.node_id.as_str())
                .env("JOBWRIGHT_NODE_URL", node.url.as_str());

            let handle = runner
                .execute(Arc::new(task))
                .await
                .map_err(|e| JobError::Rejected {
                    job_id: job_id.clone(),
                    node_id: node.node_id.clone(),
                    reason: e.to_string(),
                })?;
            debug!(job_id = %job_id, node_id = %node.node_id, "job accepted by local runner");

            tokio::spawn(async move {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => TaskOutcome::Failed(e.to_string()),
                };
                let event = ManagerEvent::JobCompleted {
                    job_id: job_id.clone(),
                    outcome: JobOutcome::from(outcome),
                };
                if events.send(event).await.is_err() {
                    warn!(job_id = %job_id, "runtime gone; dropping job completion");
                }
            });

            Ok(())
        })
    }
}
