#![allow(dead_code)]

use std::sync::Arc;

use jobwright::config::{ConfigFile, JobConfig, NodeConfig, QueueConfig, RawConfigFile, WorkflowConfig};
use jobwright::model::{Job, JobInput, JobSpec, Metadata, PreconditionSpec, TaskModel};
use jobwright::resource::{QueueManager, ResourceMonitor, ResourceNode, Topology};
use jobwright::scheduler::Scheduler;
use jobwright::types::Priority;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_slots(mut self, slots: usize) -> Self {
        self.config.engine.slots = slots;
        self
    }

    pub fn with_dispatch_timeout_ms(mut self, ms: u64) -> Self {
        self.config.scheduler.dispatch_timeout_ms = ms;
        self
    }

    pub fn with_node(mut self, id: &str, capacity: u32) -> Self {
        let port = 9000 + self.config.node.len();
        self.config.node.insert(
            id.to_string(),
            NodeConfig {
                url: format!("127.0.0.1:{port}"),
                capacity,
            },
        );
        self
    }

    pub fn with_queue(mut self, name: &str, nodes: &[&str]) -> Self {
        self.config.queue.insert(
            name.to_string(),
            QueueConfig {
                nodes: nodes.iter().map(|s| s.to_string()).collect(),
            },
        );
        self
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn with_workflow(mut self, name: &str, wf: WorkflowConfig) -> Self {
        self.config.workflow.insert(name.to_string(), wf);
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new(cmd: &str, queue: &str) -> Self {
        Self {
            job: JobConfig {
                cmd: cmd.to_string(),
                queue: queue.to_string(),
                load: 1,
                priority: Priority::default(),
                metadata: Metadata::new(),
            },
        }
    }

    pub fn load(mut self, load: u32) -> Self {
        self.job.load = load;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.job.priority = priority;
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}

/// Builder for `TaskModel`.
pub struct TaskBuilder {
    task: TaskModel,
}

impl TaskBuilder {
    pub fn new(id: &str, cmd: &str) -> Self {
        Self {
            task: TaskModel {
                id: id.to_string(),
                name: None,
                cmd: cmd.to_string(),
                preconditions: Vec::new(),
                required_metadata: Vec::new(),
            },
        }
    }

    pub fn precondition(mut self, spec: PreconditionSpec) -> Self {
        self.task.preconditions.push(spec);
        self
    }

    pub fn requires(mut self, key: &str) -> Self {
        self.task.required_metadata.push(key.to_string());
        self
    }

    pub fn build(self) -> TaskModel {
        self.task
    }
}

/// Builder for `WorkflowConfig`.
pub struct WorkflowBuilder {
    wf: WorkflowConfig,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            wf: WorkflowConfig {
                priority: Priority::default(),
                metadata: Metadata::new(),
                tasks: Vec::new(),
            },
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.wf.priority = priority;
        self
    }

    pub fn metadata(mut self, key: &str, value: &str) -> Self {
        self.wf.metadata.add(key, value);
        self
    }

    pub fn task(mut self, task: TaskModel) -> Self {
        self.wf.tasks.push(task);
        self
    }

    pub fn build(self) -> WorkflowConfig {
        self.wf
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A job spec whose id is also its name.
pub fn job_spec(id: &str, queue: &str, load: u32) -> JobSpec {
    JobSpec::new(
        Job::new(id, queue).with_id(id).with_load(load),
        JobInput::command(format!("echo {id}")),
    )
}

/// In-memory topology: `nodes` as `(id, capacity)`, `queues` as
/// `(name, node ids)`.
pub fn topology(nodes: &[(&str, u32)], queues: &[(&str, &[&str])]) -> Topology {
    let monitor = ResourceMonitor::from_nodes(
        nodes
            .iter()
            .map(|(id, cap)| ResourceNode::new(*id, format!("{id}.local:7000"), *cap)),
    )
    .expect("valid nodes");
    let queue_manager = QueueManager::from_queues(
        queues
            .iter()
            .map(|(name, ids)| (*name, ids.iter().map(|s| s.to_string()).collect())),
        &monitor,
    )
    .expect("valid queues");
    Topology::new(monitor, queue_manager)
}

/// Scheduler over [`topology`].
pub fn scheduler(nodes: &[(&str, u32)], queues: &[(&str, &[&str])]) -> Scheduler {
    let topo = topology(nodes, queues);
    Scheduler::new(Arc::clone(&topo.monitor), Arc::clone(&topo.queues))
}
