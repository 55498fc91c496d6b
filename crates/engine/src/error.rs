//! Engine-level error types.

use thiserror::Error;

use nodes::object_store::ObjectStoreError;
use nodes::RegistryError;

/// Errors produced by the workflow engine (validation, marshaling,
/// execution, persistence).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------
    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference { node_id: String, side: &'static str },

    /// An edge references an output or input name that isn't declared.
    #[error("edge references unknown parameter '{param}' on node '{node_id}' ({side} side)")]
    UnknownParameter {
        node_id: String,
        param: String,
        side: &'static str,
    },

    /// Two edges target the same `(target, target_input)` pair on an input
    /// that isn't declared fan-in.
    #[error("duplicate edge into non-fan-in input '{target_input}' of node '{target}'")]
    DuplicateTargetBinding { target: String, target_input: String },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    // ------ Marshaling errors ------
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("object store error: {0}")]
    ObjectStore(#[from] ObjectStoreError),

    // ------ Credit errors ------
    #[error("insufficient compute credits for organization '{organization_id}'")]
    InsufficientCredits { organization_id: String },

    // ------ Registry/execution errors ------
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Persistence error from whatever `ExecutionStore`/`CreditManager`
    /// implementation is plugged in. Kept as a boxed trait object so this
    /// crate never depends on a concrete persistence backend — `db`
    /// depends on `engine`, not the other way around.
    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}
