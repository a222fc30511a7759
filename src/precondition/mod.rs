// src/precondition/mod.rs

//! Preconditions gating the release of workflow tasks.
//!
//! A precondition is a pure predicate over a [`ConditionContext`]. Task
//! models name preconditions by `kind`; the [`PreconditionRegistry`] turns a
//! [`PreconditionSpec`](crate::model::PreconditionSpec) into a live
//! precondition and the [`PreconditionEvaluator`] runs an ordered list of
//! them.

pub mod builtin;
pub mod evaluator;
pub mod registry;

use std::fmt::Debug;
use std::time::Duration;

use crate::model::{Metadata, PreconditionSpec};

pub use evaluator::{ConditionClock, PreconditionEvaluator};
pub use registry::{PreconditionFactory, PreconditionRegistry, RegistryError};

/// What a precondition gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct ConditionContext<'a> {
    /// Dynamic metadata of the workflow instance.
    pub metadata: &'a Metadata,
    /// Free slots on the local engine runner at evaluation time.
    pub open_slots: usize,
}

impl<'a> ConditionContext<'a> {
    pub fn new(metadata: &'a Metadata, open_slots: usize) -> Self {
        Self {
            metadata,
            open_slots,
        }
    }
}

/// A named, side-effect free predicate.
pub trait Precondition: Send + Sync + Debug {
    /// Identifier used in logs when the precondition fails.
    fn id(&self) -> &str;

    fn passes(&self, ctx: &ConditionContext<'_>) -> bool;
}

/// How a failing precondition is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionRules {
    /// Failures are ignored.
    pub optional: bool,
    /// Counts as met once it has been evaluated for this long.
    pub timeout: Option<Duration>,
}

impl From<&PreconditionSpec> for ConditionRules {
    fn from(spec: &PreconditionSpec) -> Self {
        Self {
            optional: spec.optional,
            timeout: spec.timeout_secs.map(Duration::from_secs),
        }
    }
}
