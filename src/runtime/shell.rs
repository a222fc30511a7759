// src/runtime/shell.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::batch::{BatchBackend, BatchManager};
use crate::errors::Result;
use crate::model::JobSpec;
use crate::resource::ResourceNode;
use crate::runtime::core::ManagerCore;
use crate::runtime::job_table::JobReport;
use crate::runtime::{ManagerCommand, ManagerEvent};

/// Async IO shell around [`ManagerCore`].
///
/// Reads events from the channel (plus a retry timer), feeds them to the
/// core, and runs the resulting dispatches against the [`BatchManager`].
/// Each dispatch runs in its own tokio task so a slow backend never stalls
/// the loop; its result comes back as a `JobDispatched` or
/// `DispatchFailed` event.
pub struct Runtime<B: BatchBackend + 'static> {
    core: ManagerCore,
    event_rx: mpsc::Receiver<ManagerEvent>,
    event_tx: mpsc::WeakSender<ManagerEvent>,
    batch: Arc<BatchManager<B>>,
}

impl<B: BatchBackend + 'static> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: BatchBackend + 'static> Runtime<B> {
    /// `event_tx` must feed `event_rx`; the runtime keeps only a weak handle
    /// so the loop still ends when every external sender is gone.
    pub fn new(
        core: ManagerCore,
        event_rx: mpsc::Receiver<ManagerEvent>,
        event_tx: &mpsc::Sender<ManagerEvent>,
        batch: Arc<BatchManager<B>>,
    ) -> Self {
        Self {
            core,
            event_rx,
            event_tx: event_tx.downgrade(),
            batch,
        }
    }

    /// Main event loop. Returns the final job table.
    pub async fn run(mut self) -> Result<Vec<JobReport>> {
        info!(backend = self.batch.backend().name(), "resource manager runtime started");

        let period = self.core.options().retry_interval;
        let mut retry = interval_at(Instant::now() + period, period);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                biased;
                maybe = self.event_rx.recv() => match maybe {
                    Some(e) => e,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
                _ = retry.tick() => ManagerEvent::RetryTick,
            };

            if !matches!(event, ManagerEvent::RetryTick) {
                debug!(?event, "runtime received event");
            }
            if let ManagerEvent::JobCompleted { job_id, .. } = &event {
                self.batch.job_finished(job_id);
            }

            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command);
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.core.report())
    }

    fn execute_command(&self, command: ManagerCommand) {
        match command {
            ManagerCommand::Dispatch { spec, node } => self.spawn_dispatch(spec, node),
            ManagerCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
    }

    fn spawn_dispatch(&self, spec: JobSpec, node: ResourceNode) {
        let batch = Arc::clone(&self.batch);
        let tx = self.event_tx.clone();

        tokio::spawn(async move {
            let event = match batch.submit_job(&spec, &node).await {
                Ok(job_id) => ManagerEvent::JobDispatched {
                    job_id,
                    node_id: node.node_id,
                },
                Err(e) => ManagerEvent::DispatchFailed {
                    job_id: spec.id().to_string(),
                    reason: e.to_string(),
                },
            };
            match tx.upgrade() {
                Some(tx) => {
                    if tx.send(event).await.is_err() {
                        warn!(job_id = %spec.id(), "runtime gone; dropping dispatch result");
                    }
                }
                None => warn!(job_id = %spec.id(), "runtime gone; dropping dispatch result"),
            }
        });
    }
}
