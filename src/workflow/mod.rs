// src/workflow/mod.rs

//! Workflow processing.
//!
//! - [`state`]: `WorkflowState`, its categories and the transition rules.
//! - [`machine`]: per-instance state machine with history and listeners.
//! - [`processor`]: walks one instance through the tasks of its model.
//! - [`engine`]: runs every instance on the shared engine runner.

pub mod engine;
pub mod machine;
pub mod processor;
pub mod state;

pub use engine::{InstanceSummary, TickReport, WorkflowEngine};
pub use machine::{StateChange, StateListener, WorkflowStateMachine};
pub use processor::{Release, WorkflowProcessor};
pub use state::{StateCategory, WorkflowState};
