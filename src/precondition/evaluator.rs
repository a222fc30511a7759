// src/precondition/evaluator.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::precondition::{ConditionContext, ConditionRules, Precondition};

/// When each precondition of a task was first evaluated.
///
/// Owned by whoever re-evaluates a task over time; reset when the task
/// changes.
#[derive(Debug, Clone, Default)]
pub struct ConditionClock {
    started: HashMap<String, Instant>,
}

impl ConditionClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time since `id` was first seen, starting its clock if needed.
    pub fn waited(&mut self, id: &str, now: Instant) -> Duration {
        let start = *self.started.entry(id.to_string()).or_insert(now);
        now.saturating_duration_since(start)
    }

    pub fn clear(&mut self) {
        self.started.clear();
    }
}

/// Ordered list of preconditions that must all pass.
///
/// An optional precondition never blocks, and one with a timeout stops
/// blocking once it has been evaluated for that long.
#[derive(Debug, Clone, Default)]
pub struct PreconditionEvaluator {
    preconditions: Vec<(Arc<dyn Precondition>, ConditionRules)>,
}

impl PreconditionEvaluator {
    /// Every precondition required, without timeout.
    pub fn new(preconditions: Vec<Arc<dyn Precondition>>) -> Self {
        Self::with_rules(
            preconditions
                .into_iter()
                .map(|p| (p, ConditionRules::default()))
                .collect(),
        )
    }

    pub fn with_rules(preconditions: Vec<(Arc<dyn Precondition>, ConditionRules)>) -> Self {
        Self { preconditions }
    }

    pub fn len(&self) -> usize {
        self.preconditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.preconditions.is_empty()
    }

    /// Evaluate in order, stopping at the first failure. An empty list passes.
    pub fn passes_preconditions(&self, ctx: &ConditionContext<'_>) -> bool {
        self.first_failure(ctx).is_none()
    }

    /// Id of the first precondition that blocks, if any, evaluated as if
    /// for the first time.
    pub fn first_failure(&self, ctx: &ConditionContext<'_>) -> Option<&str> {
        self.first_blocking(ctx, &mut ConditionClock::new())
    }

    /// Id of the first precondition that blocks, if any.
    ///
    /// Preconditions after the blocking one are not evaluated and their
    /// clocks do not start.
    pub fn first_blocking(
        &self,
        ctx: &ConditionContext<'_>,
        clock: &mut ConditionClock,
    ) -> Option<&str> {
        let now = Instant::now();
        for (pre, rules) in self.preconditions.iter() {
            let waited = clock.waited(pre.id(), now);
            if pre.passes(ctx) {
                debug!(precondition = pre.id(), "precondition passed");
                continue;
            }
            if rules.optional {
                debug!(precondition = pre.id(), "optional precondition failed; ignored");
                continue;
            }
            if let Some(limit) = rules.timeout {
                if waited >= limit {
                    debug!(
                        precondition = pre.id(),
                        waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                        "precondition timed out; treated as met"
                    );
                    continue;
                }
            }
            debug!(precondition = pre.id(), "precondition failed");
            return Some(pre.id());
        }
        None
    }
}
