// src/precondition/builtin.rs

//! Built-in precondition kinds.

use crate::precondition::{ConditionContext, Precondition};

/// `kind = "always"`
#[derive(Debug, Clone)]
pub struct Always {
    pub id: String,
}

impl Precondition for Always {
    fn id(&self) -> &str {
        &self.id
    }

    fn passes(&self, _ctx: &ConditionContext<'_>) -> bool {
        true
    }
}

/// `kind = "never"`
#[derive(Debug, Clone)]
pub struct Never {
    pub id: String,
}

impl Precondition for Never {
    fn id(&self) -> &str {
        &self.id
    }

    fn passes(&self, _ctx: &ConditionContext<'_>) -> bool {
        false
    }
}

/// `kind = "metadata_present"`, param `key`.
#[derive(Debug, Clone)]
pub struct MetadataPresent {
    pub id: String,
    pub key: String,
}

impl Precondition for MetadataPresent {
    fn id(&self) -> &str {
        &self.id
    }

    fn passes(&self, ctx: &ConditionContext<'_>) -> bool {
        ctx.metadata.contains(&self.key)
    }
}

/// `kind = "metadata_equals"`, params `key` and `value`.
///
/// Passes when any value stored under `key` equals `value`.
#[derive(Debug, Clone)]
pub struct MetadataEquals {
    pub id: String,
    pub key: String,
    pub value: String,
}

impl Precondition for MetadataEquals {
    fn id(&self) -> &str {
        &self.id
    }

    fn passes(&self, ctx: &ConditionContext<'_>) -> bool {
        ctx.metadata.get_all(&self.key).iter().any(|v| *v == self.value)
    }
}

/// `kind = "open_slots"`, param `min`.
#[derive(Debug, Clone)]
pub struct OpenSlots {
    pub id: String,
    pub min: usize,
}

impl Precondition for OpenSlots {
    fn id(&self) -> &str {
        &self.id
    }

    fn passes(&self, ctx: &ConditionContext<'_>) -> bool {
        ctx.open_slots >= self.min
    }
}
