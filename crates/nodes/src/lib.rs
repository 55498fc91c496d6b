//! `nodes` crate — the value model, the `ExecutableNode` contract, and the
//! trait seams (object store, secrets, integrations) node implementations
//! see directly.
//!
//! Every node — built-in and plugin alike — must implement
//! [`ExecutableNode`]. The engine crate dispatches execution through this
//! trait object. This crate has no dependency on `engine` so the node
//! catalog never needs to know about scheduling, credit accounting, or
//! persistence.

pub mod builtin;
pub mod error;
pub mod mock;
pub mod object_store;
pub mod registry;
pub mod secrets;
pub mod traits;
pub mod value;

pub use error::NodeError;
pub use registry::{NodeRegistry, RegistryError};
pub use traits::{ExecutableNode, NodeContext, NodeOutcome, NodeTypeMeta, RuntimeMode};
