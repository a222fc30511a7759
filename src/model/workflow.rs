// src/model/workflow.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::Priority;

/// A named precondition attached to a task.
///
/// `kind` selects a factory in the precondition registry; `params` are
/// passed to that factory unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreconditionSpec {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// A failing optional precondition never blocks the task.
    #[serde(default)]
    pub optional: bool,
    /// Treat the precondition as met once it has been evaluated for this
    /// long without passing.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl PreconditionSpec {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            params: BTreeMap::new(),
            optional: false,
            timeout_secs: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskModel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub cmd: String,
    /// Evaluated in order before the task is released; all must pass.
    #[serde(default, rename = "precondition")]
    pub preconditions: Vec<PreconditionSpec>,
    /// Metadata keys the instance must carry when the task comes up; a
    /// missing key fails the instance.
    #[serde(default)]
    pub required_metadata: Vec<String>,
}

impl TaskModel {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// A workflow definition: an ordered list of tasks run one after another.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowModel {
    pub id: String,
    pub tasks: Vec<TaskModel>,
    pub priority: Priority,
}

impl WorkflowModel {
    pub fn new(id: impl Into<String>, tasks: Vec<TaskModel>) -> Self {
        Self {
            id: id.into(),
            tasks,
            priority: Priority::default(),
        }
    }
}
