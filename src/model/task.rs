use crate::model::metadata::Metadata;
use crate::types::{InstanceId, Priority};

/// Descriptor of one runnable task belonging to a workflow instance.
///
/// Produced by a workflow processor when a task is ready and handed to the
/// engine runner.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInstance {
    pub instance_id: InstanceId,
    /// Id of the task inside its workflow model.
    pub model_id: String,
    pub name: String,
    pub command: String,
    pub priority: Priority,
    /// Dynamic metadata of the instance at the time the task was released.
    pub metadata: Metadata,
}

impl TaskInstance {
    /// Identifier used in logs and by the runner: `<instance>/<task>`.
    pub fn job_id(&self) -> String {
        format!("{}/{}", self.instance_id, self.model_id)
    }
}
