// src/engine/mod.rs

//! Local execution pool.
//!
//! - [`runner`]: `EngineRunner`, a fixed number of slots shared by every
//!   caller; each task holds one slot for as long as it runs.
//! - [`task`]: the `EngineTask` abstraction and its outcome type.
//! - [`shell_task`]: a task that runs a shell command.

pub mod runner;
pub mod shell_task;
pub mod task;

pub use runner::EngineRunner;
pub use shell_task::ShellTask;
pub use task::{EngineTask, FnTask, TaskFuture, TaskOutcome};
