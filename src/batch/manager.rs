// src/batch/manager.rs

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::batch::backend::BatchBackend;
use crate::batch::probe::probe_node;
use crate::errors::JobError;
use crate::model::JobSpec;
use crate::resource::ResourceNode;
use crate::types::{JobId, NodeId};

/// Dispatches scheduled jobs to a [`BatchBackend`] and remembers where each
/// one runs.
///
/// A dispatch is bounded by `dispatch_timeout`; when node probing is on, the
/// TCP check shares the same bound. Failures are returned to the caller with
/// job and node context and are never retried here.
#[derive(Debug)]
pub struct BatchManager<B: BatchBackend> {
    backend: B,
    dispatch_timeout: Duration,
    probe_nodes: bool,
    placements: Mutex<BTreeMap<JobId, NodeId>>,
}

impl<B: BatchBackend> BatchManager<B> {
    pub fn new(backend: B, dispatch_timeout: Duration) -> Self {
        Self {
            backend,
            dispatch_timeout,
            probe_nodes: false,
            placements: Mutex::new(BTreeMap::new()),
        }
    }

    /// Probe every node over TCP before dispatching to it.
    pub fn with_probe(mut self, enabled: bool) -> Self {
        self.probe_nodes = enabled;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn dispatch_timeout(&self) -> Duration {
        self.dispatch_timeout
    }

    /// Hand `spec` to the backend for execution on `node`.
    pub async fn submit_job(&self, spec: &JobSpec, node: &ResourceNode) -> Result<JobId, JobError> {
        let job_id = spec.id().to_string();

        if self.probe_nodes {
            if let Err(reason) = probe_node(node, self.dispatch_timeout).await {
                warn!(job_id = %job_id, node_id = %node.node_id, %reason, "node failed liveness probe");
                return Err(JobError::NodeUnreachable {
                    job_id,
                    node_id: node.node_id.clone(),
                    reason,
                });
            }
        }

        // Recorded up front: a fast backend may report completion before
        // dispatch returns.
        self.placements
            .lock()
            .insert(job_id.clone(), node.node_id.clone());

        let result = timeout(
            self.dispatch_timeout,
            self.backend.dispatch(spec.clone(), node.clone()),
        )
        .await;

        let err = match result {
            Ok(Ok(())) => {
                info!(
                    job_id = %job_id,
                    node_id = %node.node_id,
                    backend = self.backend.name(),
                    "job dispatched"
                );
                return Ok(job_id);
            }
            Ok(Err(e)) => e,
            Err(_) => JobError::DispatchTimeout {
                job_id: job_id.clone(),
                node_id: node.node_id.clone(),
                timeout_ms: u64::try_from(self.dispatch_timeout.as_millis()).unwrap_or(u64::MAX),
            },
        };

        self.placements.lock().remove(&job_id);
        warn!(job_id = %job_id, node_id = %node.node_id, error = %err, "dispatch failed");
        Err(err)
    }

    /// Node a dispatched, unfinished job runs on.
    pub fn execution_node(&self, job_id: &str) -> Option<NodeId> {
        self.placements.lock().get(job_id).cloned()
    }

    /// Unfinished jobs dispatched to `node_id`, sorted by job id.
    pub fn jobs_on_node(&self, node_id: &str) -> Vec<JobId> {
        // BTreeMap iteration is already ordered by job id.
        self.placements
            .lock()
            .iter()
            .filter(|(_, n)| n.as_str() == node_id)
            .map(|(job, _)| job.clone())
            .collect()
    }

    /// Forget a finished job. Returns the node it ran on.
    pub fn job_finished(&self, job_id: &str) -> Option<NodeId> {
        self.placements.lock().remove(job_id)
    }
}
