// src/workflow/processor.rs

//! Per-instance workflow processor.
//!
//! Walks the tasks of a [`WorkflowModel`] in order. Before each task is
//! released its preconditions are evaluated; a failing precondition parks
//! the instance in `Waiting` until a later evaluation passes. A task
//! finishing while the instance is paused is remembered and applied on
//! resume.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::engine::TaskOutcome;
use crate::errors::{EngineError, JobwrightError, Result};
use crate::model::{Metadata, TaskInstance, TaskModel, WorkflowModel};
use crate::precondition::{
    ConditionClock, ConditionContext, ConditionRules, PreconditionEvaluator, PreconditionRegistry,
};
use crate::types::{InstanceId, Priority};
use crate::workflow::machine::{StateChange, StateListener, WorkflowStateMachine};
use crate::workflow::state::WorkflowState;

/// Result of asking a processor for its next task.
#[derive(Debug, Clone, PartialEq)]
pub enum Release {
    /// The task is ready to run.
    Ready(TaskInstance),
    /// Blocked on the named precondition.
    Blocked(String),
    /// Not in a state that releases tasks.
    Idle,
}

#[derive(Debug)]
pub struct WorkflowProcessor {
    machine: WorkflowStateMachine,
    model: Arc<WorkflowModel>,
    metadata: Metadata,
    priority: Priority,
    /// One evaluator per task of the model, same order.
    evaluators: Vec<PreconditionEvaluator>,
    /// First evaluation time of the current task's preconditions.
    clock: ConditionClock,
    current: usize,
    completed_tasks: Vec<String>,
    /// Start order, used to keep equal priorities first-come first-served.
    seq: u64,
    task_in_flight: bool,
    deferred_outcome: Option<TaskOutcome>,
    created_at: DateTime<Utc>,
}

impl WorkflowProcessor {
    /// Build the processor, instantiating every task's preconditions.
    pub fn new(
        instance_id: impl Into<InstanceId>,
        model: Arc<WorkflowModel>,
        metadata: Metadata,
        priority: Priority,
        seq: u64,
        registry: &PreconditionRegistry,
    ) -> Result<Self> {
        let mut evaluators = Vec::with_capacity(model.tasks.len());
        for task in model.tasks.iter() {
            let built = registry.build_all(&task.preconditions).map_err(|e| {
                JobwrightError::ConfigError(format!(
                    "workflow '{}' task '{}': {}",
                    model.id, task.id, e
                ))
            })?;
            let rules = task.preconditions.iter().map(ConditionRules::from);
            evaluators.push(PreconditionEvaluator::with_rules(
                built.into_iter().zip(rules).collect(),
            ));
        }

        Ok(Self {
            machine: WorkflowStateMachine::new(instance_id),
            model,
            metadata,
            priority,
            evaluators,
            clock: ConditionClock::new(),
            current: 0,
            completed_tasks: Vec::new(),
            seq,
            task_in_flight: false,
            deferred_outcome: None,
            created_at: Utc::now(),
        })
    }

    pub fn instance_id(&self) -> &str {
        self.machine.instance_id()
    }

    pub fn model(&self) -> &WorkflowModel {
        &self.model
    }

    pub fn state(&self) -> &WorkflowState {
        self.machine.state()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.add(key, value);
    }

    pub fn history(&self) -> &[StateChange] {
        self.machine.history()
    }

    pub fn times_blocked(&self) -> u32 {
        self.machine.times_blocked()
    }

    pub fn completed_tasks(&self) -> &[String] {
        &self.completed_tasks
    }

    pub fn add_listener(&mut self, listener: Arc<dyn StateListener>) {
        self.machine.add_listener(listener);
    }

    pub fn current_task(&self) -> Option<&TaskModel> {
        self.model.tasks.get(self.current)
    }

    pub fn has_task_in_flight(&self) -> bool {
        self.task_in_flight
    }

    /// Whether the engine should ask this processor for work.
    pub fn is_runnable(&self) -> bool {
        !self.task_in_flight
            && matches!(
                self.state(),
                WorkflowState::Queued | WorkflowState::Running | WorkflowState::Waiting { .. }
            )
    }

    /// Created → Queued.
    pub fn submit(&mut self) -> Result<()> {
        self.machine.transition(WorkflowState::Queued)?;
        info!(instance_id = %self.instance_id(), model = %self.model.id, priority = %self.priority, "workflow queued");
        Ok(())
    }

    /// Evaluate the current task's preconditions and release it if they
    /// pass.
    pub fn try_release(&mut self, open_slots: usize) -> Result<Release> {
        if !self.is_runnable() {
            return Ok(Release::Idle);
        }
        if *self.state() == WorkflowState::Queued {
            self.machine.transition(WorkflowState::Running)?;
        }

        let model = Arc::clone(&self.model);
        let Some(task) = model.tasks.get(self.current) else {
            // Only reachable for a model without tasks.
            if matches!(self.state(), WorkflowState::Waiting { .. }) {
                self.machine.transition(WorkflowState::Running)?;
            }
            self.machine.transition(WorkflowState::Completed)?;
            return Ok(Release::Idle);
        };

        if let Some(missing) = task
            .required_metadata
            .iter()
            .find(|key| !self.metadata.contains(key))
        {
            let reason = format!("task '{}' is missing required metadata '{missing}'", task.id);
            warn!(instance_id = %self.instance_id(), task = %task.id, key = %missing, "required metadata missing; failing workflow");
            if matches!(self.state(), WorkflowState::Waiting { .. }) {
                self.machine.transition(WorkflowState::Running)?;
            }
            self.machine.transition(WorkflowState::Failed { reason })?;
            return Ok(Release::Idle);
        }

        let ctx = ConditionContext::new(&self.metadata, open_slots);
        if let Some(failed) = self.evaluators[self.current].first_blocking(&ctx, &mut self.clock) {
            let failed = failed.to_string();
            match self.state() {
                WorkflowState::Waiting { condition } if *condition == failed => {}
                WorkflowState::Waiting { .. } => {
                    // Blocked on a different condition now; record it.
                    self.machine.transition(WorkflowState::Running)?;
                    self.enter_waiting(&failed)?;
                }
                _ => self.enter_waiting(&failed)?,
            }
            return Ok(Release::Blocked(failed));
        }

        if matches!(self.state(), WorkflowState::Waiting { .. }) {
            self.machine.transition(WorkflowState::Running)?;
        }

        Ok(Release::Ready(TaskInstance {
            instance_id: self.instance_id().to_string(),
            model_id: task.id.clone(),
            name: task.display_name().to_string(),
            command: task.cmd.clone(),
            priority: self.priority,
            metadata: self.metadata.clone(),
        }))
    }

    /// The released task was accepted by the runner.
    pub fn mark_dispatched(&mut self) {
        self.task_in_flight = true;
    }

    /// The in-flight task ended.
    pub fn on_task_finished(&mut self, outcome: TaskOutcome) -> Result<()> {
        self.task_in_flight = false;
        if *self.state() == WorkflowState::Paused {
            self.deferred_outcome = Some(outcome);
            return Ok(());
        }
        self.apply_outcome(outcome)
    }

    /// Running or Waiting → Paused.
    pub fn pause(&mut self) -> Result<()> {
        self.machine.transition(WorkflowState::Paused)?;
        info!(instance_id = %self.instance_id(), "workflow paused");
        Ok(())
    }

    /// Paused → Running, then apply any task result that arrived while
    /// paused.
    pub fn resume(&mut self) -> Result<()> {
        self.machine.transition(WorkflowState::Running)?;
        info!(instance_id = %self.instance_id(), "workflow resumed");
        if let Some(outcome) = self.deferred_outcome.take() {
            self.apply_outcome(outcome)?;
        }
        Ok(())
    }

    /// Created or Queued → Failed("cancelled").
    pub fn cancel(&mut self) -> Result<()> {
        if !matches!(self.state(), WorkflowState::Created | WorkflowState::Queued) {
            return Err(EngineError::IllegalTransition {
                from: self.state().to_string(),
                to: "failed(cancelled)".to_string(),
            }
            .into());
        }
        self.machine.transition(WorkflowState::Failed {
            reason: "cancelled".to_string(),
        })?;
        info!(instance_id = %self.instance_id(), "workflow cancelled");
        Ok(())
    }

    fn enter_waiting(&mut self, condition: &str) -> Result<()> {
        info!(instance_id = %self.instance_id(), precondition = %condition, "workflow waiting on precondition");
        self.machine.transition(WorkflowState::Waiting {
            condition: condition.to_string(),
        })?;
        Ok(())
    }

    fn apply_outcome(&mut self, outcome: TaskOutcome) -> Result<()> {
        let task_id = self
            .current_task()
            .map(|t| t.id.clone())
            .unwrap_or_default();

        if !outcome.is_success() {
            warn!(instance_id = %self.instance_id(), task = %task_id, %outcome, "workflow task failed");
            self.machine.transition(WorkflowState::Failed {
                reason: format!("task '{task_id}' {outcome}"),
            })?;
            return Ok(());
        }

        self.completed_tasks.push(task_id);
        self.current += 1;
        self.clock.clear();
        if self.current >= self.model.tasks.len() {
            self.machine.transition(WorkflowState::Completed)?;
            info!(instance_id = %self.instance_id(), model = %self.model.id, "workflow completed");
        }
        Ok(())
    }
}
