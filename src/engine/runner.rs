// src/engine/runner.rs

//! Bounded-concurrency task pool.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::task::{EngineTask, TaskOutcome};
use crate::errors::EngineError;

/// Runs tasks on a fixed number of slots.
///
/// A slot is a semaphore permit: it is claimed in the same atomic step that
/// checks capacity, moved into the tokio task that runs the work, and
/// dropped when that task ends however it ends. `used_slots()` therefore
/// always lies in `0..=num_slots()`.
///
/// Cloning is cheap and every clone shares the same slots.
#[derive(Debug, Clone)]
pub struct EngineRunner {
    slots: Arc<Semaphore>,
    num_slots: usize,
}

impl EngineRunner {
    /// Pool with `num_slots` slots; zero is raised to one.
    pub fn new(num_slots: usize) -> Self {
        let num_slots = if num_slots == 0 {
            warn!("engine runner asked for 0 slots; using 1");
            1
        } else {
            num_slots
        };
        info!(num_slots, "engine runner created");
        Self {
            slots: Arc::new(Semaphore::new(num_slots)),
            num_slots,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn open_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn used_slots(&self) -> usize {
        self.num_slots.saturating_sub(self.slots.available_permits())
    }

    pub fn has_open_slots(&self) -> bool {
        self.open_slots() > 0
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Stop handing out slots. Running tasks finish normally; callers
    /// waiting in [`execute`](Self::execute) get [`EngineError::RunnerClosed`].
    pub fn shutdown(&self) {
        info!(used = self.used_slots(), "engine runner shutting down");
        self.slots.close();
    }

    /// Wait for a free slot, then start `task` on it.
    pub async fn execute(
        &self,
        task: Arc<dyn EngineTask>,
    ) -> Result<JoinHandle<TaskOutcome>, EngineError> {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::RunnerClosed)?;
        Ok(self.spawn_on_slot(task, permit))
    }

    /// Start `task` if a slot is free right now.
    pub fn try_execute(
        &self,
        task: Arc<dyn EngineTask>,
    ) -> Result<JoinHandle<TaskOutcome>, EngineError> {
        let permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(p) => p,
            Err(TryAcquireError::NoPermits) => {
                return Err(EngineError::NoOpenSlots {
                    used: self.used_slots(),
                    total: self.num_slots,
                });
            }
            Err(TryAcquireError::Closed) => return Err(EngineError::RunnerClosed),
        };
        Ok(self.spawn_on_slot(task, permit))
    }

    fn spawn_on_slot(
        &self,
        task: Arc<dyn EngineTask>,
        permit: OwnedSemaphorePermit,
    ) -> JoinHandle<TaskOutcome> {
        let task_id = task.id().to_string();
        debug!(task = %task_id, used = self.used_slots(), total = self.num_slots, "task claimed slot");

        tokio::spawn(async move {
            // Held until this future completes or is dropped.
            let _slot = permit;

            // Run the work in its own task so a panic is observed here as a
            // JoinError instead of tearing down the slot holder.
            let work = tokio::spawn(async move { task.run().await });

            let outcome = match work.await {
                Ok(Ok(())) => TaskOutcome::Success,
                Ok(Err(err)) => {
                    warn!(task = %task_id, error = %format!("{err:#}"), "task failed");
                    TaskOutcome::Failed(format!("{err:#}"))
                }
                Err(join_err) if join_err.is_panic() => {
                    error!(task = %task_id, "task panicked");
                    TaskOutcome::Panicked
                }
                Err(join_err) => {
                    warn!(task = %task_id, error = %join_err, "task was cancelled");
                    TaskOutcome::Failed(join_err.to_string())
                }
            };

            debug!(task = %task_id, %outcome, "task released slot");
            outcome
        })
    }
}
