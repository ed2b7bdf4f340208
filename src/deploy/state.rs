// ABOUTME: Rollout state marker types for the type state pattern.
// ABOUTME: Later states carry the data earlier steps established (mode, adjusted definition, result).

use crate::backend::{ServiceDefinition, ServiceRecord};

/// Whether the service already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloutMode {
    Create,
    Update,
}

/// Initial state: definition built, nothing asked of the backend yet.
/// Available actions: `check_existing()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Existence known.
/// Available actions: `validate()`
#[derive(Debug, Clone, Copy)]
pub struct Checked {
    pub(crate) mode: RolloutMode,
}

/// Dry run passed, possibly after dropping the invoker bypass.
/// Available actions: `apply()`
#[derive(Debug, Clone)]
pub struct Validated {
    pub(crate) mode: RolloutMode,
    pub(crate) definition: ServiceDefinition,
}

/// Mutation finished.
/// Available actions: `record()`, `into_record()`
#[derive(Debug, Clone)]
pub struct Deployed {
    pub(crate) mode: RolloutMode,
    pub(crate) record: ServiceRecord,
}
