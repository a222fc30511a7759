// src/model/mod.rs

//! Immutable value types shared by the scheduler and the workflow engine.
//!
//! - [`job`]: `Job`, `JobInput`, `JobSpec` and the job status reported by the
//!   resource manager.
//! - [`metadata`]: ordered multi-valued string metadata.
//! - [`task`]: `TaskInstance`, the descriptor of one runnable workflow task.
//! - [`workflow`]: `WorkflowModel` and its task/precondition definitions.
//! - [`transaction`]: catalog-side transaction receipts.

pub mod job;
pub mod metadata;
pub mod task;
pub mod transaction;
pub mod workflow;

pub use job::{Job, JobInput, JobSpec, JobStatus};
pub use metadata::Metadata;
pub use task::TaskInstance;
pub use transaction::{TransactionReceipt, TransactionalMetadata};
pub use workflow::{PreconditionSpec, TaskModel, WorkflowModel};
