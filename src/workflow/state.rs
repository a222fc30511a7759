// src/workflow/state.rs

use std::fmt;

/// Coarse grouping of workflow states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateCategory {
    /// Not yet submitted.
    Initial,
    /// Submitted but not currently doing anything.
    Holding,
    /// Executing or waiting on a condition.
    Active,
    /// Finished, successfully or not. Nothing leaves this category.
    Done,
}

/// Lifecycle state of a workflow instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Created,
    Queued,
    Running,
    /// Blocked on the named precondition.
    Waiting { condition: String },
    Paused,
    Completed,
    Failed { reason: String },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowState::Created => "created",
            WorkflowState::Queued => "queued",
            WorkflowState::Running => "running",
            WorkflowState::Waiting { .. } => "waiting",
            WorkflowState::Paused => "paused",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed { .. } => "failed",
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> String {
        match self {
            WorkflowState::Created => "workflow instance created".to_string(),
            WorkflowState::Queued => "queued for execution".to_string(),
            WorkflowState::Running => "executing tasks".to_string(),
            WorkflowState::Waiting { condition } => format!("waiting on condition '{condition}'"),
            WorkflowState::Paused => "paused by request".to_string(),
            WorkflowState::Completed => "all tasks completed".to_string(),
            WorkflowState::Failed { reason } => format!("failed: {reason}"),
        }
    }

    pub fn category(&self) -> StateCategory {
        match self {
            WorkflowState::Created => StateCategory::Initial,
            WorkflowState::Queued | WorkflowState::Paused => StateCategory::Holding,
            WorkflowState::Running | WorkflowState::Waiting { .. } => StateCategory::Active,
            WorkflowState::Completed | WorkflowState::Failed { .. } => StateCategory::Done,
        }
    }

    pub fn is_done(&self) -> bool {
        self.category() == StateCategory::Done
    }

    /// Whether moving from `self` to `to` is allowed.
    pub fn can_transition_to(&self, to: &WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, to),
            (Created, Queued)
                | (Queued, Running)
                | (Running, Waiting { .. })
                | (Waiting { .. }, Running)
                | (Running, Paused)
                | (Waiting { .. }, Paused)
                | (Paused, Running)
                | (Running, Completed)
                | (Running, Failed { .. })
                | (Created, Failed { .. })
                | (Queued, Failed { .. })
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Waiting { condition } => write!(f, "waiting({condition})"),
            WorkflowState::Failed { reason } => write!(f, "failed({reason})"),
            other => f.write_str(other.name()),
        }
    }
}
