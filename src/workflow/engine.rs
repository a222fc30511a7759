// src/workflow/engine.rs

//! Local workflow engine.
//!
//! Owns every workflow processor and drives them on the shared
//! [`EngineRunner`]. Each [`tick`](WorkflowEngine::tick) collects finished
//! tasks, then walks the runnable instances by priority (highest first,
//! start order within equal priority) releasing tasks while the runner has
//! open slots.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::{EngineRunner, ShellTask, TaskOutcome};
use crate::errors::{EngineError, Result};
use crate::model::{Metadata, TransactionReceipt, TransactionalMetadata, WorkflowModel};
use crate::precondition::PreconditionRegistry;
use crate::types::{InstanceId, Priority};
use crate::workflow::machine::StateListener;
use crate::workflow::processor::{Release, WorkflowProcessor};
use crate::workflow::state::WorkflowState;

/// Snapshot of one workflow instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSummary {
    pub instance_id: InstanceId,
    pub model_id: String,
    pub state: WorkflowState,
    pub priority: Priority,
    pub times_blocked: u32,
    pub completed_tasks: usize,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tasks whose results were collected.
    pub finished: usize,
    /// Tasks handed to the runner.
    pub released: usize,
    /// State transitions across all instances.
    pub transitions: usize,
}

impl TickReport {
    pub fn made_progress(&self) -> bool {
        self.finished + self.released + self.transitions > 0
    }
}

pub struct WorkflowEngine {
    runner: EngineRunner,
    registry: PreconditionRegistry,
    processors: BTreeMap<InstanceId, WorkflowProcessor>,
    in_flight: HashMap<InstanceId, JoinHandle<TaskOutcome>>,
    listeners: Vec<Arc<dyn StateListener>>,
    receipts: HashMap<InstanceId, TransactionalMetadata>,
    next_seq: u64,
    poll_interval: Duration,
    /// Finished instances kept for reporting.
    retain_finished: usize,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("runner", &self.runner)
            .field("instances", &self.processors.len())
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    pub fn new(runner: EngineRunner, registry: PreconditionRegistry) -> Self {
        Self {
            runner,
            registry,
            processors: BTreeMap::new(),
            in_flight: HashMap::new(),
            listeners: Vec::new(),
            receipts: HashMap::new(),
            next_seq: 0,
            poll_interval: Duration::from_millis(20),
            retain_finished: usize::MAX,
        }
    }

    /// Keep at most `retain_finished` finished instances (and their
    /// receipts); the earliest started are dropped first.
    pub fn with_retention(mut self, retain_finished: usize) -> Self {
        self.retain_finished = retain_finished;
        self
    }

    /// How long [`run`](Self::run) sleeps between ticks.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn runner(&self) -> &EngineRunner {
        &self.runner
    }

    /// Attach a listener to every instance started from now on.
    pub fn add_listener(&mut self, listener: Arc<dyn StateListener>) {
        self.listeners.push(listener);
    }

    /// Create an instance of `model` and queue it.
    ///
    /// `priority` overrides the model's own priority.
    pub fn start_workflow(
        &mut self,
        model: WorkflowModel,
        metadata: Metadata,
        priority: Option<Priority>,
    ) -> Result<InstanceId> {
        let instance_id = Uuid::new_v4().to_string();
        let priority = priority.unwrap_or(model.priority);
        let seq = self.next_seq;
        self.next_seq += 1;

        let mut processor = WorkflowProcessor::new(
            instance_id.clone(),
            Arc::new(model),
            metadata,
            priority,
            seq,
            &self.registry,
        )?;
        for l in self.listeners.iter() {
            processor.add_listener(Arc::clone(l));
        }
        processor.submit()?;

        info!(instance_id = %instance_id, model = %processor.model().id, %priority, "workflow started");
        self.processors.insert(instance_id.clone(), processor);
        Ok(instance_id)
    }

    pub fn pause(&mut self, instance_id: &str) -> Result<()> {
        self.processor_mut(instance_id)?.pause()
    }

    pub fn resume(&mut self, instance_id: &str) -> Result<()> {
        self.processor_mut(instance_id)?.resume()?;
        self.record_receipt_if_completed(instance_id);
        Ok(())
    }

    pub fn cancel(&mut self, instance_id: &str) -> Result<()> {
        self.processor_mut(instance_id)?.cancel()
    }

    /// Add dynamic metadata to an instance; a waiting instance sees it on
    /// the next tick.
    pub fn add_metadata(
        &mut self,
        instance_id: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.processor_mut(instance_id)?.add_metadata(key, value);
        Ok(())
    }

    pub fn state_of(&self, instance_id: &str) -> Option<WorkflowState> {
        self.processors.get(instance_id).map(|p| p.state().clone())
    }

    pub fn processor(&self, instance_id: &str) -> Option<&WorkflowProcessor> {
        self.processors.get(instance_id)
    }

    /// Every instance, in start order.
    pub fn instances(&self) -> Vec<InstanceSummary> {
        let mut out: Vec<_> = self.processors.values().collect();
        out.sort_by_key(|p| p.seq());
        out.into_iter()
            .map(|p| InstanceSummary {
                instance_id: p.instance_id().to_string(),
                model_id: p.model().id.clone(),
                state: p.state().clone(),
                priority: p.priority(),
                times_blocked: p.times_blocked(),
                completed_tasks: p.completed_tasks().len(),
            })
            .collect()
    }

    /// Receipt of a completed instance: the tasks it ran plus its final
    /// metadata.
    pub fn completion_receipt(&self, instance_id: &str) -> Option<&TransactionalMetadata> {
        self.receipts.get(instance_id)
    }

    /// Every instance is in a DONE state.
    pub fn is_idle(&self) -> bool {
        self.processors.values().all(|p| p.state().is_done())
    }

    /// Collect finished tasks, then release runnable ones.
    pub async fn tick(&mut self) -> Result<TickReport> {
        let before = self.transition_count();
        let mut report = TickReport::default();

        report.finished = self.collect_finished().await?;
        report.released = self.release_runnable()?;

        report.transitions = self.transition_count() - before;
        self.evict_finished();
        Ok(report)
    }

    /// Forget every finished instance and its receipt. Returns how many
    /// were removed.
    pub fn prune_finished(&mut self) -> usize {
        let done = self.finished_by_start();
        self.forget(&done);
        done.len()
    }

    /// Tick until every instance is done, or until nothing can move any
    /// more (instances paused or waiting with no work in flight anywhere).
    pub async fn run_until_idle(&mut self) -> Result<Vec<InstanceSummary>> {
        loop {
            let report = self.tick().await?;
            if self.is_idle() {
                break;
            }
            if !report.made_progress() && self.in_flight.is_empty() && self.runner.used_slots() == 0 {
                warn!("workflow engine stalled: remaining instances are paused or waiting");
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        Ok(self.instances())
    }

    /// Tick until `shutdown` flips to `true` (or, with `exit_when_idle`,
    /// until [`run_until_idle`](Self::run_until_idle) returns).
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<bool>,
        exit_when_idle: bool,
    ) -> Result<Vec<InstanceSummary>> {
        info!(instances = self.processors.len(), "workflow engine started");

        if exit_when_idle {
            tokio::select! {
                res = self.run_until_idle() => { res?; }
                _ = shutdown_signalled(&mut shutdown) => {
                    info!("workflow engine shutdown requested");
                }
            }
            return Ok(self.instances());
        }

        loop {
            self.tick().await?;
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown_signalled(&mut shutdown) => {
                    info!("workflow engine shutdown requested");
                    break;
                }
            }
        }
        Ok(self.instances())
    }

    async fn collect_finished(&mut self) -> Result<usize> {
        let done: Vec<InstanceId> = self
            .in_flight
            .iter()
            .filter(|(_, h)| h.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        for instance_id in done.iter() {
            let Some(handle) = self.in_flight.remove(instance_id) else {
                continue;
            };
            let outcome = handle
                .await
                .unwrap_or_else(|e| TaskOutcome::Failed(e.to_string()));
            debug!(instance_id = %instance_id, %outcome, "workflow task finished");

            if let Some(p) = self.processors.get_mut(instance_id) {
                p.on_task_finished(outcome)?;
            }
            self.record_receipt_if_completed(instance_id);
        }
        Ok(done.len())
    }

    fn release_runnable(&mut self) -> Result<usize> {
        let mut order: Vec<(Priority, u64, InstanceId)> = self
            .processors
            .values()
            .filter(|p| p.is_runnable())
            .map(|p| (p.priority(), p.seq(), p.instance_id().to_string()))
            .collect();
        order.sort_by(|a, b| b.0.cmp_value(&a.0).then(a.1.cmp(&b.1)));

        let mut released = 0;
        for (_, _, instance_id) in order {
            if !self.runner.has_open_slots() {
                debug!("no open slots; deferring remaining workflows");
                break;
            }
            let open_slots = self.runner.open_slots();
            let Some(p) = self.processors.get_mut(&instance_id) else {
                continue;
            };

            let task = match p.try_release(open_slots)? {
                Release::Ready(task) => task,
                Release::Blocked(_) | Release::Idle => {
                    self.record_receipt_if_completed(&instance_id);
                    continue;
                }
            };

            let shell = ShellTask::new(task.job_id(), task.command.clone())
                .env("JOBWRIGHT_INSTANCE_ID", task.instance_id.as_str())
                .env("JOBWRIGHT_TASK_ID", task.model_id.as_str());

            match self.runner.try_execute(Arc::new(shell)) {
                Ok(handle) => {
                    p.mark_dispatched();
                    self.in_flight.insert(instance_id, handle);
                    released += 1;
                }
                Err(EngineError::NoOpenSlots { .. }) => {
                    // Slots taken by someone else since the check above.
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(released)
    }

    fn record_receipt_if_completed(&mut self, instance_id: &str) {
        if self.receipts.contains_key(instance_id) {
            return;
        }
        let Some(p) = self.processors.get(instance_id) else {
            return;
        };
        if *p.state() != WorkflowState::Completed {
            return;
        }
        let receipt = TransactionReceipt::new(instance_id, p.completed_tasks().iter().cloned());
        self.receipts.insert(
            instance_id.to_string(),
            TransactionalMetadata::new(receipt, p.metadata().clone()),
        );
    }

    fn evict_finished(&mut self) {
        let done = self.finished_by_start();
        let excess = done.len().saturating_sub(self.retain_finished);
        if excess > 0 {
            self.forget(&done[..excess]);
        }
    }

    fn finished_by_start(&self) -> Vec<InstanceId> {
        let mut done: Vec<&WorkflowProcessor> = self
            .processors
            .values()
            .filter(|p| p.state().is_done() && !self.in_flight.contains_key(p.instance_id()))
            .collect();
        done.sort_by_key(|p| p.seq());
        done.into_iter().map(|p| p.instance_id().to_string()).collect()
    }

    fn forget(&mut self, instance_ids: &[InstanceId]) {
        for id in instance_ids {
            self.processors.remove(id);
            self.receipts.remove(id);
            debug!(instance_id = %id, "finished workflow evicted");
        }
    }

    fn transition_count(&self) -> usize {
        self.processors.values().map(|p| p.history().len()).sum()
    }

    fn processor_mut(&mut self, instance_id: &str) -> Result<&mut WorkflowProcessor> {
        self.processors
            .get_mut(instance_id)
            .ok_or_else(|| EngineError::InstanceNotFound(instance_id.to_string()).into())
    }
}

/// Resolves once `true` is published; never resolves if the sender is gone.
async fn shutdown_signalled(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
