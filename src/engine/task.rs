// src/engine/task.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`EngineTask::run`].
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// A unit of work the [`EngineRunner`](super::EngineRunner) can execute.
pub trait EngineTask: Send + Sync + 'static {
    /// Identifier used in logs.
    fn id(&self) -> &str;

    fn run(&self) -> TaskFuture<'_>;
}

/// How a task run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// The task returned an error.
    Failed(String),
    /// The task panicked.
    Panicked,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Success => f.write_str("success"),
            TaskOutcome::Failed(reason) => write!(f, "failed: {reason}"),
            TaskOutcome::Panicked => f.write_str("panicked"),
        }
    }
}

/// Task built from a closure returning a future.
///
/// ```ignore
/// let task = FnTask::new("sleepy", || async {
///     tokio::time::sleep(Duration::from_millis(50)).await;
///     Ok(())
/// });
/// ```
pub struct FnTask<F> {
    id: String,
    f: F,
}

impl<F> FnTask<F> {
    pub fn new(id: impl Into<String>, f: F) -> Self {
        Self { id: id.into(), f }
    }
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<F, Fut> EngineTask for FnTask<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin((self.f)())
    }
}
