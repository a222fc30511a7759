// src/workflow/machine.rs

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::types::InstanceId;
use crate::workflow::state::WorkflowState;

/// One accepted transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub instance_id: InstanceId,
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub at: DateTime<Utc>,
}

/// Receives every accepted transition of the instances it is attached to.
pub trait StateListener: Send + Sync {
    fn on_state_change(&self, change: &StateChange);
}

/// State of one workflow instance plus the record of how it got there.
pub struct WorkflowStateMachine {
    instance_id: InstanceId,
    state: WorkflowState,
    history: Vec<StateChange>,
    times_blocked: u32,
    listeners: Vec<Arc<dyn StateListener>>,
}

impl fmt::Debug for WorkflowStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowStateMachine")
            .field("instance_id", &self.instance_id)
            .field("state", &self.state)
            .field("history", &self.history.len())
            .field("times_blocked", &self.times_blocked)
            .finish_non_exhaustive()
    }
}

impl WorkflowStateMachine {
    /// New machine in [`WorkflowState::Created`].
    pub fn new(instance_id: impl Into<InstanceId>) -> Self {
        Self {
            instance_id: instance_id.into(),
            state: WorkflowState::Created,
            history: Vec::new(),
            times_blocked: 0,
            listeners: Vec::new(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn history(&self) -> &[StateChange] {
        &self.history
    }

    /// How many times the instance entered `Waiting`.
    pub fn times_blocked(&self) -> u32 {
        self.times_blocked
    }

    pub fn add_listener(&mut self, listener: Arc<dyn StateListener>) {
        self.listeners.push(listener);
    }

    /// Move to `to` if the transition is allowed.
    ///
    /// A rejected transition leaves the state untouched and notifies nobody.
    pub fn transition(&mut self, to: WorkflowState) -> Result<(), EngineError> {
        if !self.state.can_transition_to(&to) {
            warn!(
                instance_id = %self.instance_id,
                from = %self.state,
                to = %to,
                "illegal workflow transition rejected"
            );
            return Err(EngineError::IllegalTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }

        if matches!(to, WorkflowState::Waiting { .. }) {
            self.times_blocked += 1;
        }

        let from = std::mem::replace(&mut self.state, to.clone());
        debug!(instance_id = %self.instance_id, %from, %to, "workflow transition");

        let change = StateChange {
            instance_id: self.instance_id.clone(),
            from,
            to,
            at: Utc::now(),
        };
        for listener in self.listeners.iter() {
            listener.on_state_change(&change);
        }
        self.history.push(change);
        Ok(())
    }
}
