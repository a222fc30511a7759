// src/batch/mod.rs

//! Handing scheduled jobs to whatever actually runs them.
//!
//! - [`backend`]: the `BatchBackend` trait and the local backend that runs
//!   job commands on the engine runner.
//! - [`manager`]: `BatchManager`, dispatch with a timeout plus a record of
//!   which node runs which job.
//! - [`probe`]: TCP liveness check of a node before dispatch.

pub mod backend;
pub mod manager;
pub mod probe;

pub use backend::{BatchBackend, DispatchFuture, LocalBatchBackend};
pub use manager::BatchManager;
pub use probe::probe_node;
