// src/precondition/registry.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::model::PreconditionSpec;
use crate::precondition::builtin::{Always, MetadataEquals, MetadataPresent, Never, OpenSlots};
use crate::precondition::Precondition;

/// A precondition spec could not be turned into a precondition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("precondition '{id}' has unknown kind '{kind}'")]
    UnknownKind { id: String, kind: String },

    #[error("precondition '{id}' is missing param '{param}'")]
    MissingParam { id: String, param: &'static str },

    #[error("precondition '{id}' has invalid param '{param}': {reason}")]
    InvalidParam {
        id: String,
        param: &'static str,
        reason: String,
    },
}

/// Builds a precondition from its spec.
pub type PreconditionFactory = fn(&PreconditionSpec) -> Result<Arc<dyn Precondition>, RegistryError>;

/// Maps a precondition `kind` to the factory that builds it.
#[derive(Debug, Clone)]
pub struct PreconditionRegistry {
    factories: BTreeMap<&'static str, PreconditionFactory>,
}

impl PreconditionRegistry {
    /// Registry with no kinds at all.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with every built-in kind.
    pub fn builtin() -> Self {
        let mut reg = Self::empty();
        reg.register("always", build_always);
        reg.register("never", build_never);
        reg.register("metadata_present", build_metadata_present);
        reg.register("metadata_equals", build_metadata_equals);
        reg.register("open_slots", build_open_slots);
        reg
    }

    /// Add or replace the factory for `kind`.
    pub fn register(&mut self, kind: &'static str, factory: PreconditionFactory) {
        self.factories.insert(kind, factory);
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn build(&self, spec: &PreconditionSpec) -> Result<Arc<dyn Precondition>, RegistryError> {
        let factory = self
            .factories
            .get(spec.kind.as_str())
            .ok_or_else(|| RegistryError::UnknownKind {
                id: spec.id.clone(),
                kind: spec.kind.clone(),
            })?;
        factory(spec)
    }

    /// Build every spec in order, failing on the first bad one.
    pub fn build_all(
        &self,
        specs: &[PreconditionSpec],
    ) -> Result<Vec<Arc<dyn Precondition>>, RegistryError> {
        specs.iter().map(|s| self.build(s)).collect()
    }
}

impl Default for PreconditionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn param(spec: &PreconditionSpec, name: &'static str) -> Result<String, RegistryError> {
    spec.params
        .get(name)
        .cloned()
        .ok_or_else(|| RegistryError::MissingParam {
            id: spec.id.clone(),
            param: name,
        })
}

fn build_always(spec: &PreconditionSpec) -> Result<Arc<dyn Precondition>, RegistryError> {
    Ok(Arc::new(Always {
        id: spec.id.clone(),
    }))
}

fn build_never(spec: &PreconditionSpec) -> Result<Arc<dyn Precondition>, RegistryError> {
    Ok(Arc::new(Never {
        id: spec.id.clone(),
    }))
}

fn build_metadata_present(spec: &PreconditionSpec) -> Result<Arc<dyn Precondition>, RegistryError> {
    Ok(Arc::new(MetadataPresent {
        id: spec.id.clone(),
        key: param(spec, "key")?,
    }))
}

fn build_metadata_equals(spec: &PreconditionSpec) -> Result<Arc<dyn Precondition>, RegistryError> {
    Ok(Arc::new(MetadataEquals {
        id: spec.id.clone(),
        key: param(spec, "key")?,
        value: param(spec, "value")?,
    }))
}

fn build_open_slots(spec: &PreconditionSpec) -> Result<Arc<dyn Precondition>, RegistryError> {
    let raw = param(spec, "min")?;
    let min = raw
        .trim()
        .parse::<usize>()
        .map_err(|e| RegistryError::InvalidParam {
            id: spec.id.clone(),
            param: "min",
            reason: e.to_string(),
        })?;
    Ok(Arc::new(OpenSlots {
        id: spec.id.clone(),
        min,
    }))
}
