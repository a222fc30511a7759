// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] mirrors the TOML layout (`RawConfigFile`) and the validated
//!   form (`ConfigFile`).
//! - [`loader`] reads a file from disk.
//! - [`validate`] turns a raw config into a `ConfigFile`, rejecting anything
//!   that should abort startup.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, EngineSection, JobConfig, MonitorSection, NodeConfig, QueueConfig, QueuesSection,
    RawConfigFile, SchedulerSection, WorkflowConfig,
};
