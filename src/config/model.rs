// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::model::{Job, JobInput, JobSpec, Metadata, TaskModel, WorkflowModel};
use crate::types::Priority;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [engine]
/// slots = 6
///
/// [scheduler]
/// dispatch_timeout_ms = 5000
///
/// [node.local]
/// url = "127.0.0.1:9000"
/// capacity = 4
///
/// [queue.default]
/// nodes = ["local"]
///
/// [job.hello]
/// cmd = "echo hello"
/// queue = "default"
/// ```
///
/// Every section is optional at the TOML level; [`validate`](super::validate)
/// decides what a usable config needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub queues: QueuesSection,

    /// Nodes from `[node.<id>]`.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,

    /// Queues from `[queue.<name>]`.
    #[serde(default)]
    pub queue: BTreeMap<String, QueueConfig>,

    /// Jobs submitted at startup, from `[job.<name>]`.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,

    /// Workflows started at startup, from `[workflow.<name>]`.
    #[serde(default)]
    pub workflow: BTreeMap<String, WorkflowConfig>,
}

/// Validated configuration.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub engine: EngineSection,
    pub scheduler: SchedulerSection,
    pub monitor: MonitorSection,
    pub queues: QueuesSection,
    pub node: BTreeMap<String, NodeConfig>,
    pub queue: BTreeMap<String, QueueConfig>,
    pub job: BTreeMap<String, JobConfig>,
    pub workflow: BTreeMap<String, WorkflowConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            engine: raw.engine,
            scheduler: raw.scheduler,
            monitor: raw.monitor,
            queues: raw.queues,
            node: raw.node,
            queue: raw.queue,
            job: raw.job,
            workflow: raw.workflow,
        }
    }

    /// Job specs for every `[job.<name>]`, highest priority first (name order
    /// within a priority). The job id is the table name.
    pub fn job_specs(&self) -> Vec<JobSpec> {
        let mut specs: Vec<JobSpec> = self
            .job
            .iter()
            .map(|(name, jc)| jc.to_spec(name))
            .collect();
        specs.sort_by(|a, b| b.job.priority.cmp_value(&a.job.priority));
        specs
    }

    /// Workflow models for every `[workflow.<name>]`, with their start metadata.
    pub fn workflow_models(&self) -> Vec<(WorkflowModel, Metadata)> {
        self.workflow
            .iter()
            .map(|(name, wc)| {
                let mut model = WorkflowModel::new(name.clone(), wc.tasks.clone());
                model.priority = wc.priority;
                (model, wc.metadata.clone())
            })
            .collect()
    }
}

/// `[engine]` section: the local execution pool.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EngineSection {
    /// Number of tasks the local runner executes at once.
    #[serde(default = "default_slots")]
    pub slots: usize,

    /// Finished workflow instances kept for reporting.
    #[serde(default = "default_retain_finished")]
    pub retain_finished: usize,
}

fn default_slots() -> usize {
    4
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            retain_finished: default_retain_finished(),
        }
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SchedulerSection {
    /// Upper bound on a single dispatch to a batch backend.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,

    /// Maximum number of pending jobs per queue.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// How often jobs that found no capacity are re-probed.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Open a TCP connection to the node before each dispatch.
    #[serde(default)]
    pub probe_nodes: bool,

    /// Finished jobs kept for reporting; older ones are forgotten.
    #[serde(default = "default_retain_finished")]
    pub retain_finished: usize,
}

fn default_dispatch_timeout_ms() -> u64 {
    5_000
}

fn default_max_queue_size() -> usize {
    1_000
}

fn default_retry_interval_ms() -> u64 {
    250
}

fn default_retain_finished() -> usize {
    1_000
}

impl SchedulerSection {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            max_queue_size: default_max_queue_size(),
            retry_interval_ms: default_retry_interval_ms(),
            probe_nodes: false,
            retain_finished: default_retain_finished(),
        }
    }
}

/// `[monitor]` section: extra node definition files.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorSection {
    /// `file://` URIs or paths (relative to the config file) of TOML files
    /// containing `[node.<id>]` tables.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// `[queues]` section: extra queue definition directories.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueuesSection {
    /// Directories whose `*.toml` files contain `[queue.<name>]` tables.
    #[serde(default)]
    pub dirs: Vec<String>,
}

/// `[node.<id>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeConfig {
    /// `host:port` the node answers on.
    pub url: String,
    /// Maximum load the node accepts.
    pub capacity: u32,
}

/// `[queue.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    pub nodes: Vec<String>,
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub cmd: String,
    pub queue: String,
    #[serde(default = "default_load")]
    pub load: u32,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_load() -> u32 {
    1
}

impl JobConfig {
    pub fn to_spec(&self, name: &str) -> JobSpec {
        let job = Job::new(name, self.queue.clone())
            .with_id(name)
            .with_load(self.load)
            .with_priority(self.priority);
        let input = JobInput {
            command: Some(self.cmd.clone()),
            metadata: self.metadata.clone(),
        };
        JobSpec::new(job, input)
    }
}

/// `[workflow.<name>]` section.
///
/// ```toml
/// [workflow.ingest]
/// priority = "high"
///
/// [[workflow.ingest.task]]
/// id = "fetch"
/// cmd = "echo fetch"
///
/// [[workflow.ingest.task.precondition]]
/// id = "has-input"
/// kind = "metadata_present"
/// params = { key = "InputFile" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub priority: Priority,
    /// Dynamic metadata the instance starts with.
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskModel>,
}
