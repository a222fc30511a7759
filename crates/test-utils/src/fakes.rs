#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use jobwright::batch::{BatchBackend, DispatchFuture};
use jobwright::errors::JobError;
use jobwright::model::JobSpec;
use jobwright::precondition::{ConditionContext, Precondition};
use jobwright::resource::ResourceNode;
use jobwright::runtime::{JobOutcome, ManagerEvent};
use jobwright::types::{JobId, NodeId};
use jobwright::workflow::{StateChange, StateListener};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// What the fake backend does with one dispatch.
#[derive(Debug, Clone)]
pub enum FakeDispatch {
    /// Accept, then report the given outcome straight away.
    Complete(JobOutcome),
    /// Accept and never report completion.
    Accept,
    /// Refuse the dispatch.
    Reject(String),
    /// Never resolve the dispatch future.
    Hang,
}

/// A fake batch backend.
///
/// Each dispatch consumes the next scripted [`FakeDispatch`]; once the
/// script is exhausted the default behaviour applies. Every dispatch
/// attempt is recorded.
pub struct FakeBackend {
    events: mpsc::Sender<ManagerEvent>,
    script: Mutex<VecDeque<FakeDispatch>>,
    default: FakeDispatch,
    dispatched: Arc<Mutex<Vec<(JobId, NodeId)>>>,
}

impl FakeBackend {
    /// Completes every job successfully.
    pub fn completing(events: mpsc::Sender<ManagerEvent>) -> Self {
        Self::with_default(events, FakeDispatch::Complete(JobOutcome::Success))
    }

    /// Accepts every job and leaves it running.
    pub fn accepting(events: mpsc::Sender<ManagerEvent>) -> Self {
        Self::with_default(events, FakeDispatch::Accept)
    }

    pub fn with_default(events: mpsc::Sender<ManagerEvent>, default: FakeDispatch) -> Self {
        Self {
            events,
            script: Mutex::new(VecDeque::new()),
            default,
            dispatched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue behaviours for the next dispatches, in order.
    pub fn then(self, step: FakeDispatch) -> Self {
        self.script.lock().push_back(step);
        self
    }

    /// Handle onto the dispatch log that survives moving the backend.
    pub fn dispatch_log(&self) -> Arc<Mutex<Vec<(JobId, NodeId)>>> {
        Arc::clone(&self.dispatched)
    }

    pub fn dispatched(&self) -> Vec<(JobId, NodeId)> {
        self.dispatched.lock().clone()
    }
}

impl BatchBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn dispatch(&self, spec: JobSpec, node: ResourceNode) -> DispatchFuture<'_> {
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        let job_id = spec.id().to_string();
        self.dispatched
            .lock()
            .push((job_id.clone(), node.node_id.clone()));
        let events = self.events.clone();

        Box::pin(async move {
            match step {
                FakeDispatch::Complete(outcome) => {
                    tokio::spawn(async move {
                        let _ = events
                            .send(ManagerEvent::JobCompleted { job_id, outcome })
                            .await;
                    });
                    Ok(())
                }
                FakeDispatch::Accept => Ok(()),
                FakeDispatch::Reject(reason) => Err(JobError::Rejected {
                    job_id,
                    node_id: node.node_id,
                    reason,
                }),
                FakeDispatch::Hang => std::future::pending().await,
            }
        })
    }
}

/// Records every state change it is told about.
#[derive(Debug, Default)]
pub struct RecordingListener {
    changes: Mutex<Vec<StateChange>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn changes(&self) -> Vec<StateChange> {
        self.changes.lock().clone()
    }

    /// `from -> to` names of changes seen for `instance_id`.
    pub fn transitions_of(&self, instance_id: &str) -> Vec<(String, String)> {
        self.changes
            .lock()
            .iter()
            .filter(|c| c.instance_id == instance_id)
            .map(|c| (c.from.name().to_string(), c.to.name().to_string()))
            .collect()
    }
}

impl StateListener for RecordingListener {
    fn on_state_change(&self, change: &StateChange) {
        self.changes.lock().push(change.clone());
    }
}

/// Precondition with a fixed answer that counts how often it is asked.
#[derive(Debug)]
pub struct CountingPrecondition {
    id: String,
    answer: bool,
    calls: AtomicUsize,
}

impl CountingPrecondition {
    pub fn new(id: &str, answer: bool) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Precondition for CountingPrecondition {
    fn id(&self) -> &str {
        &self.id
    }

    fn passes(&self, _ctx: &ConditionContext<'_>) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
    }
}
