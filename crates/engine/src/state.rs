//! Execution context and execution state.
//!
//! `ExecutionState` is mutable but grows monotonically: the only mutator is
//! [`ExecutionState::apply_result`], called from a single-threaded section
//! of the scheduler. Every other component receives it by shared reference
//! and is forbidden from retaining it past the call that received it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nodes::value::NodeRuntimeValues;

use crate::dag::ExecutionLevel;
use crate::models::Workflow;

/// Immutable, per-execution context built once by the validator/façade.
#[derive(Debug, Clone)]
pub struct WorkflowExecutionContext {
    pub workflow: Workflow,
    pub execution_levels: Vec<ExecutionLevel>,
    pub ordered_node_ids: Vec<String>,
    pub workflow_id: Uuid,
    pub organization_id: String,
    pub execution_id: Uuid,
    pub deployment_id: Option<String>,
}

/// Why a node did not execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UpstreamFailure,
    ConditionalBranch,
}

/// Immutable result of attempting to run one node.
#[derive(Debug, Clone)]
pub enum NodeExecutionResult {
    Completed {
        node_id: String,
        outputs: NodeRuntimeValues,
        usage: u64,
    },
    Skipped {
        node_id: String,
        reason: SkipReason,
        blocked_by: Vec<String>,
    },
    Errored {
        node_id: String,
        error: String,
        usage: u64,
    },
}

impl NodeExecutionResult {
    pub fn node_id(&self) -> &str {
        match self {
            NodeExecutionResult::Completed { node_id, .. }
            | NodeExecutionResult::Skipped { node_id, .. }
            | NodeExecutionResult::Errored { node_id, .. } => node_id,
        }
    }
}

/// Derived, never stored — kept as a pure function of the settled node
/// sets rather than a field mutated alongside them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowExecutionStatus {
    Executing,
    Completed,
    Error,
}

/// Mutable, monotonically-grown execution state. Exclusively owned by the
/// scheduler for the duration of one workflow execution.
#[derive(Debug, Default)]
pub struct ExecutionState {
    node_outputs: HashMap<String, NodeRuntimeValues>,
    executed_nodes: Vec<String>,
    skipped_nodes: Vec<String>,
    node_errors: HashMap<String, String>,
    node_usage: HashMap<String, u64>,
    skip_reasons: HashMap<String, (SkipReason, Vec<String>)>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_outputs(&self) -> &HashMap<String, NodeRuntimeValues> {
        &self.node_outputs
    }

    pub fn executed_nodes(&self) -> &[String] {
        &self.executed_nodes
    }

    pub fn skipped_nodes(&self) -> &[String] {
        &self.skipped_nodes
    }

    pub fn node_errors(&self) -> &HashMap<String, String> {
        &self.node_errors
    }

    pub fn node_usage(&self) -> &HashMap<String, u64> {
        &self.node_usage
    }

    pub fn skip_reason_of(&self, node_id: &str) -> Option<&(SkipReason, Vec<String>)> {
        self.skip_reasons.get(node_id)
    }

    pub fn total_usage(&self) -> u64 {
        self.node_usage.values().sum()
    }

    pub fn is_settled(&self, node_id: &str) -> bool {
        self.executed_nodes.iter().any(|id| id == node_id)
            || self.skipped_nodes.iter().any(|id| id == node_id)
            || self.node_errors.contains_key(node_id)
    }

    /// The only mutator. Enforces the following invariants after every
    /// call:
    /// - a node id appears in at most one of executed/skipped/errored;
    /// - a node is present in `node_outputs` iff it is in `executed_nodes`;
    /// - `node_usage[id] == 0` for a skipped node.
    ///
    /// Panics on a double-apply for the same node id — that would indicate
    /// a scheduler bug (applying a level twice), not a reachable data state.
    pub fn apply_result(&mut self, result: NodeExecutionResult) {
        let node_id = result.node_id().to_string();
        assert!(
            !self.is_settled(&node_id),
            "node '{node_id}' was already applied to execution state"
        );

        match result {
            NodeExecutionResult::Completed { node_id, outputs, usage } => {
                self.node_outputs.insert(node_id.clone(), outputs);
                self.node_usage.insert(node_id.clone(), usage);
                self.executed_nodes.push(node_id);
            }
            NodeExecutionResult::Skipped { node_id, reason, blocked_by } => {
                self.skip_reasons.insert(node_id.clone(), (reason, blocked_by));
                self.skipped_nodes.push(node_id);
            }
            NodeExecutionResult::Errored { node_id, error, usage } => {
                if usage > 0 {
                    self.node_usage.insert(node_id.clone(), usage);
                }
                self.node_errors.insert(node_id, error);
            }
        }
    }
}

/// Pure function of `(orderedNodeIds, executedNodes, skippedNodes,
/// nodeErrors, skipReasons)`.
pub fn status_of(context: &WorkflowExecutionContext, state: &ExecutionState) -> WorkflowExecutionStatus {
    for node_id in &context.ordered_node_ids {
        if !state.is_settled(node_id) {
            return WorkflowExecutionStatus::Executing;
        }
    }

    if !state.node_errors().is_empty() {
        return WorkflowExecutionStatus::Error;
    }

    let any_upstream_failure = state
        .skipped_nodes()
        .iter()
        .filter_map(|id| state.skip_reason_of(id))
        .any(|(reason, _)| *reason == SkipReason::UpstreamFailure);

    if any_upstream_failure {
        return WorkflowExecutionStatus::Error;
    }

    WorkflowExecutionStatus::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::value::NodeRuntimeValues;

    fn ctx(ordered: Vec<&str>) -> WorkflowExecutionContext {
        WorkflowExecutionContext {
            workflow: crate::models::Workflow::new(
                "h",
                "n",
                crate::models::Trigger::Manual,
                vec![],
                vec![],
            ),
            execution_levels: vec![],
            ordered_node_ids: ordered.into_iter().map(String::from).collect(),
            workflow_id: Uuid::new_v4(),
            organization_id: "org".into(),
            execution_id: Uuid::new_v4(),
            deployment_id: None,
        }
    }

    #[test]
    fn empty_workflow_is_completed() {
        let context = ctx(vec![]);
        let state = ExecutionState::new();
        assert_eq!(status_of(&context, &state), WorkflowExecutionStatus::Completed);
    }

    #[test]
    fn pending_node_means_executing() {
        let context = ctx(vec!["a"]);
        let state = ExecutionState::new();
        assert_eq!(status_of(&context, &state), WorkflowExecutionStatus::Executing);
    }

    #[test]
    fn completed_node_present_in_outputs() {
        let context = ctx(vec!["a"]);
        let mut state = ExecutionState::new();
        state.apply_result(NodeExecutionResult::Completed {
            node_id: "a".into(),
            outputs: NodeRuntimeValues::new(),
            usage: 3,
        });
        assert_eq!(status_of(&context, &state), WorkflowExecutionStatus::Completed);
        assert!(state.node_outputs().contains_key("a"));
        assert_eq!(state.total_usage(), 3);
    }

    #[test]
    fn errored_node_makes_status_error() {
        let context = ctx(vec!["a"]);
        let mut state = ExecutionState::new();
        state.apply_result(NodeExecutionResult::Errored {
            node_id: "a".into(),
            error: "boom".into(),
            usage: 0,
        });
        assert_eq!(status_of(&context, &state), WorkflowExecutionStatus::Error);
    }

    #[test]
    fn upstream_failure_skip_makes_status_error() {
        let context = ctx(vec!["a"]);
        let mut state = ExecutionState::new();
        state.apply_result(NodeExecutionResult::Skipped {
            node_id: "a".into(),
            reason: SkipReason::UpstreamFailure,
            blocked_by: vec!["p".into()],
        });
        assert_eq!(status_of(&context, &state), WorkflowExecutionStatus::Error);
    }

    #[test]
    fn conditional_skip_does_not_make_status_error() {
        let context = ctx(vec!["a"]);
        let mut state = ExecutionState::new();
        state.apply_result(NodeExecutionResult::Skipped {
            node_id: "a".into(),
            reason: SkipReason::ConditionalBranch,
            blocked_by: vec!["fork".into()],
        });
        assert_eq!(status_of(&context, &state), WorkflowExecutionStatus::Completed);
    }

    #[test]
    #[should_panic]
    fn double_apply_panics() {
        let mut state = ExecutionState::new();
        state.apply_result(NodeExecutionResult::Completed {
            node_id: "a".into(),
            outputs: NodeRuntimeValues::new(),
            usage: 0,
        });
        state.apply_result(NodeExecutionResult::Completed {
            node_id: "a".into(),
            outputs: NodeRuntimeValues::new(),
            usage: 0,
        });
    }
}
