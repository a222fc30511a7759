// src/scheduler/mod.rs

//! Matching pending jobs to nodes.
//!
//! - [`job_queue`]: per-queue FIFO of jobs waiting for capacity.
//! - [`scheduler`]: least-loaded node selection and load reservation.
//! - [`step`]: structured result of a single scheduling attempt.

pub mod job_queue;
pub mod scheduler;
pub mod step;

pub use job_queue::JobQueue;
pub use scheduler::Scheduler;
pub use step::ScheduleStep;
