// src/runtime/event_handlers.rs

//! Event handling logic for the manager core.
//!
//! Every handler is synchronous and side-effect free apart from the state
//! it is handed; anything that needs IO comes back as a [`ManagerCommand`].

use tracing::{debug, error, info, warn};

use crate::model::JobSpec;
use crate::resource::ResourceNode;
use crate::runtime::job_table::JobTable;
use crate::runtime::JobOutcome;
use crate::scheduler::{JobQueue, ScheduleStep, Scheduler};

/// Command produced by the core, executed by the IO shell.
#[derive(Debug, Clone)]
pub enum ManagerCommand {
    /// Hand `spec` to the batch manager for `node`; load is already
    /// reserved.
    Dispatch { spec: JobSpec, node: ResourceNode },
    /// Request that the runtime exits (used for `--once` when idle).
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct ManagerStep {
    pub commands: Vec<ManagerCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl ManagerStep {
    pub fn continue_with(commands: Vec<ManagerCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    /// Jobs this step asks the shell to dispatch.
    pub fn dispatched(&self) -> Vec<&JobSpec> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                ManagerCommand::Dispatch { spec, .. } => Some(spec),
                ManagerCommand::RequestExit => None,
            })
            .collect()
    }
}

/// Record and enqueue a newly submitted job, then try to place pending work.
pub fn handle_job_submitted(
    scheduler: &Scheduler,
    pending: &mut JobQueue,
    jobs: &mut JobTable,
    spec: JobSpec,
) -> ManagerStep {
    let job_id = spec.id().to_string();

    if let Some(status) = jobs.status_of(&job_id) {
        if !status.is_terminal() {
            warn!(job_id = %job_id, %status, "job already active; ignoring duplicate submission");
            return ManagerStep::continue_with(Vec::new());
        }
        debug!(job_id = %job_id, "resubmitting finished job");
    }

    jobs.insert(spec.clone());
    if let Err(e) = pending.add(spec) {
        error!(job_id = %job_id, error = %e, "job rejected");
        jobs.mark_failed(&job_id, e.to_string());
        return ManagerStep::continue_with(Vec::new());
    }
    info!(job_id = %job_id, pending = pending.len(), "job submitted");

    ManagerStep::continue_with(dispatch_pending(scheduler, pending, jobs))
}

/// The backend accepted a job.
pub fn handle_job_dispatched(jobs: &mut JobTable, job_id: &str) -> ManagerStep {
    jobs.mark_executing(job_id);
    ManagerStep::continue_with(Vec::new())
}

/// Dispatch failed: free the reservation and put the job back at the front
/// of its queue. It is retried on the next tick, not immediately.
pub fn handle_dispatch_failed(
    scheduler: &Scheduler,
    pending: &mut JobQueue,
    jobs: &mut JobTable,
    job_id: &str,
    reason: &str,
) -> ManagerStep {
    release(scheduler, job_id);

    if jobs.mark_retry(job_id, reason) {
        if let Some(spec) = jobs.spec_of(job_id).cloned() {
            warn!(job_id, %reason, "dispatch failed; job requeued");
            pending.requeue(spec);
        }
    } else {
        debug!(job_id, "dispatch failure for job not awaiting dispatch; ignoring");
    }

    ManagerStep::continue_with(Vec::new())
}

/// A job finished: free its load and place whatever now fits.
pub fn handle_job_completed(
    scheduler: &Scheduler,
    pending: &mut JobQueue,
    jobs: &mut JobTable,
    job_id: &str,
    outcome: &JobOutcome,
) -> ManagerStep {
    release(scheduler, job_id);
    jobs.mark_finished(job_id, outcome);
    ManagerStep::continue_with(dispatch_pending(scheduler, pending, jobs))
}

/// Cancel a job that has not been dispatched yet.
pub fn handle_cancel(pending: &mut JobQueue, jobs: &mut JobTable, job_id: &str) -> ManagerStep {
    if pending.cancel(job_id).is_some() {
        jobs.mark_killed(job_id);
    } else {
        warn!(job_id, "cancel ignored: job is not pending");
    }
    ManagerStep::continue_with(Vec::new())
}

/// Periodic retry of pending jobs.
pub fn handle_retry_tick(
    scheduler: &Scheduler,
    pending: &mut JobQueue,
    jobs: &mut JobTable,
) -> ManagerStep {
    if pending.is_empty() {
        return ManagerStep::continue_with(Vec::new());
    }
    ManagerStep::continue_with(dispatch_pending(scheduler, pending, jobs))
}

/// Place as many pending jobs as the nodes have room for.
///
/// Each queue is served strictly in order: once its head finds no capacity
/// the rest of that queue waits, so later jobs never overtake it.
pub fn dispatch_pending(
    scheduler: &Scheduler,
    pending: &mut JobQueue,
    jobs: &mut JobTable,
) -> Vec<ManagerCommand> {
    let mut commands = Vec::new();

    for queue in pending.non_empty_queues() {
        while let Some(spec) = pending.peek(&queue).cloned() {
            match scheduler.step_schedule(&spec) {
                Ok(ScheduleStep::Assigned { node, .. }) => {
                    pending.next_in(&queue);
                    jobs.mark_scheduled(spec.id(), &node.node_id);
                    commands.push(ManagerCommand::Dispatch { spec, node });
                }
                Ok(ScheduleStep::NoCapacity { .. }) => break,
                Err(e) => {
                    pending.next_in(&queue);
                    error!(job_id = %spec.id(), queue = %queue, error = %e, "job cannot be scheduled");
                    jobs.mark_failed(spec.id(), e.to_string());
                }
            }
        }
    }

    if !commands.is_empty() {
        debug!(count = commands.len(), "jobs ready for dispatch");
    }
    commands
}

fn release(scheduler: &Scheduler, job_id: &str) {
    if let Err(e) = scheduler.release(job_id) {
        error!(job_id, error = %e, "failed to release reservation");
    }
}
