// src/runtime/core.rs

//! Pure core of the resource manager.
//!
//! Consumes [`ManagerEvent`]s and produces [`ManagerStep`]s without touching
//! channels, timers or the network, so every scheduling decision can be
//! unit tested synchronously.

use crate::model::JobStatus;
use crate::runtime::event_handlers::{
    handle_cancel, handle_dispatch_failed, handle_job_completed, handle_job_dispatched,
    handle_job_submitted, handle_retry_tick, ManagerCommand, ManagerStep,
};
use crate::runtime::job_table::{JobReport, JobTable};
use crate::runtime::{ManagerEvent, RuntimeOptions};
use crate::scheduler::{JobQueue, Scheduler};

#[derive(Debug)]
pub struct ManagerCore {
    scheduler: Scheduler,
    pending: JobQueue,
    jobs: JobTable,
    options: RuntimeOptions,
}

impl ManagerCore {
    pub fn new(scheduler: Scheduler, max_queue_size: usize, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            pending: JobQueue::new(max_queue_size),
            jobs: JobTable::with_retention(options.retain_finished),
            options,
        }
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn pending(&self) -> &JobQueue {
        &self.pending
    }

    pub fn status_of(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.status_of(job_id)
    }

    pub fn report(&self) -> Vec<JobReport> {
        self.jobs.report()
    }

    /// Drop the records of every terminal job.
    pub fn prune_finished(&mut self) -> usize {
        self.jobs.prune_finished()
    }

    /// Nothing pending and every known job terminal.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.jobs.all_terminal()
    }

    /// Handle a single event, returning the commands for the IO shell.
    pub fn step(&mut self, event: ManagerEvent) -> ManagerStep {
        let step = match event {
            ManagerEvent::JobSubmitted { spec } => {
                handle_job_submitted(&self.scheduler, &mut self.pending, &mut self.jobs, spec)
            }
            ManagerEvent::JobDispatched { job_id, .. } => {
                handle_job_dispatched(&mut self.jobs, &job_id)
            }
            ManagerEvent::DispatchFailed { job_id, reason } => handle_dispatch_failed(
                &self.scheduler,
                &mut self.pending,
                &mut self.jobs,
                &job_id,
                &reason,
            ),
            ManagerEvent::JobCompleted { job_id, outcome } => handle_job_completed(
                &self.scheduler,
                &mut self.pending,
                &mut self.jobs,
                &job_id,
                &outcome,
            ),
            ManagerEvent::CancelRequested { job_id } => {
                handle_cancel(&mut self.pending, &mut self.jobs, &job_id)
            }
            ManagerEvent::RetryTick => {
                handle_retry_tick(&self.scheduler, &mut self.pending, &mut self.jobs)
            }
            ManagerEvent::ShutdownRequested => {
                return ManagerStep {
                    commands: Vec::new(),
                    keep_running: false,
                };
            }
        };
        self.exit_if_idle(step)
    }

    /// In `--once` mode, stop once there is nothing left to do.
    fn exit_if_idle(&self, mut step: ManagerStep) -> ManagerStep {
        if self.options.exit_when_idle && step.commands.is_empty() && self.is_idle() {
            step.commands.push(ManagerCommand::RequestExit);
            step.keep_running = false;
        }
        step
    }
}
