//! `engine` crate — the workflow execution engine: graph validation,
//! level-scheduled execution, parameter marshaling, credit accounting,
//! execution persistence, and live progress monitoring.
//!
//! [`facade::run_workflow`] is the single entry point; `api`, `cli`, and the
//! queue worker never touch [`scheduler::Scheduler`] directly.

pub mod credit;
pub mod dag;
pub mod error;
pub mod executor;
pub mod facade;
pub mod marshal;
pub mod models;
pub mod monitor;
pub mod scheduler;
pub mod skip;
pub mod state;
pub mod step;
pub mod store;

pub use error::EngineError;
pub use facade::{run_workflow, RuntimeParams};
pub use models::{Edge, NodeSpec, Trigger, Workflow};
pub use scheduler::{RunRequest, Scheduler};
pub use state::{ExecutionState, NodeExecutionResult, SkipReason, WorkflowExecutionContext, WorkflowExecutionStatus};
pub use store::{ExecutionStore, WorkflowExecutionRecord};
