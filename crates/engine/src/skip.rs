//! Skip classification.
//!
//! Called by the node executor immediately before a node would run, once
//! every node feeding it has settled (the level barrier in `scheduler`
//! guarantees this). Two distinct reasons a node can be skipped instead of
//! run:
//!
//! - [`SkipReason::UpstreamFailure`] — a required input is fed by a node
//!   that errored, or that was itself skipped. Failure cascades downstream.
//! - [`SkipReason::ConditionalBranch`] — a required input is fed by a node
//!   that completed but didn't populate that particular output (the classic
//!   branch/switch case: only one of several named outputs is populated per
//!   invocation).
//!
//! An optional input missing its value is never a skip reason — only
//! required inputs gate execution; an unfed optional input is simply absent
//! at marshal time.

use crate::models::{Edge, Workflow};
use crate::state::{ExecutionState, SkipReason};

/// Returns `Some((reason, blocked_by))` if `node_id` should be skipped given
/// the current state of its upstream dependencies, `None` if it's clear to
/// run (including the case where it has no inbound edges at all).
pub fn infer_skip_reason(
    node_id: &str,
    workflow: &Workflow,
    state: &ExecutionState,
) -> Option<(SkipReason, Vec<String>)> {
    let node = workflow.node(node_id)?;
    let inbound: Vec<&Edge> = workflow.inbound_edges(node_id).collect();
    if inbound.is_empty() {
        return None;
    }

    let mut failure_sources = Vec::new();
    let mut branch_sources = Vec::new();

    for edge in &inbound {
        let required = node.input(&edge.target_input).map(|p| p.required).unwrap_or(false);

        if state.node_errors().contains_key(edge.source.as_str()) {
            failure_sources.push(edge.source.clone());
            continue;
        }
        if state.skip_reason_of(&edge.source).is_some() {
            // Any skip upstream (whichever its own reason) cascades as an
            // upstream failure from this node's point of view — it never
            // got a value to consume.
            failure_sources.push(edge.source.clone());
            continue;
        }
        if !required {
            continue;
        }
        if let Some(outputs) = state.node_outputs().get(edge.source.as_str()) {
            if !outputs.contains_key(edge.source_output.as_str()) {
                branch_sources.push(edge.source.clone());
            }
        }
    }

    if !failure_sources.is_empty() {
        failure_sources.dedup();
        return Some((SkipReason::UpstreamFailure, failure_sources));
    }

    if !branch_sources.is_empty() {
        branch_sources.dedup();
        return Some((SkipReason::ConditionalBranch, branch_sources));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeSpec, Trigger};
    use crate::state::NodeExecutionResult;
    use nodes::value::{NodeRuntimeValues, ParameterSpec, ParameterValue, RuntimeValue, SemanticType};

    fn required_param(name: &str) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            ty: SemanticType::Json,
            required: true,
            default: None,
            hidden: false,
        }
    }

    fn optional_param(name: &str) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            ty: SemanticType::Json,
            required: false,
            default: None,
            hidden: false,
        }
    }

    fn workflow_with_branch() -> Workflow {
        Workflow::new(
            "h",
            "n",
            Trigger::Manual,
            vec![
                NodeSpec {
                    id: "fork".into(),
                    node_type: "branch".into(),
                    inputs: vec![],
                    outputs: vec![required_param("then"), required_param("else")],
                    literals: NodeRuntimeValues::new(),
                },
                NodeSpec {
                    id: "downstream".into(),
                    node_type: "mock".into(),
                    inputs: vec![required_param("value")],
                    outputs: vec![],
                    literals: NodeRuntimeValues::new(),
                },
            ],
            vec![Edge {
                source: "fork".into(),
                source_output: "then".into(),
                target: "downstream".into(),
                target_input: "value".into(),
            }],
        )
    }

    #[test]
    fn no_inbound_edges_is_never_skipped() {
        let wf = workflow_with_branch();
        let state = ExecutionState::new();
        assert!(infer_skip_reason("fork", &wf, &state).is_none());
    }

    #[test]
    fn errored_upstream_cascades_as_upstream_failure() {
        let wf = workflow_with_branch();
        let mut state = ExecutionState::new();
        state.apply_result(NodeExecutionResult::Errored {
            node_id: "fork".into(),
            error: "boom".into(),
            usage: 0,
        });

        let (reason, blocked_by) = infer_skip_reason("downstream", &wf, &state).expect("should skip");
        assert_eq!(reason, SkipReason::UpstreamFailure);
        assert_eq!(blocked_by, vec!["fork".to_string()]);
    }

    #[test]
    fn inactive_branch_output_is_conditional_skip() {
        let wf = workflow_with_branch();
        let mut state = ExecutionState::new();

        let mut outputs = NodeRuntimeValues::new();
        outputs.insert(
            "else".into(),
            ParameterValue::Single(RuntimeValue::Boolean(true)),
        );
        state.apply_result(NodeExecutionResult::Completed {
            node_id: "fork".into(),
            outputs,
            usage: 1,
        });

        let (reason, blocked_by) = infer_skip_reason("downstream", &wf, &state).expect("should skip");
        assert_eq!(reason, SkipReason::ConditionalBranch);
        assert_eq!(blocked_by, vec!["fork".to_string()]);
    }

    #[test]
    fn active_branch_output_does_not_skip() {
        let wf = workflow_with_branch();
        let mut state = ExecutionState::new();

        let mut outputs = NodeRuntimeValues::new();
        outputs.insert(
            "then".into(),
            ParameterValue::Single(RuntimeValue::Boolean(true)),
        );
        state.apply_result(NodeExecutionResult::Completed {
            node_id: "fork".into(),
            outputs,
            usage: 1,
        });

        assert!(infer_skip_reason("downstream", &wf, &state).is_none());
    }

    #[test]
    fn missing_optional_input_does_not_skip() {
        let wf = Workflow::new(
            "h",
            "n",
            Trigger::Manual,
            vec![
                NodeSpec {
                    id: "a".into(),
                    node_type: "mock".into(),
                    inputs: vec![],
                    outputs: vec![required_param("out")],
                    literals: NodeRuntimeValues::new(),
                },
                NodeSpec {
                    id: "b".into(),
                    node_type: "mock".into(),
                    inputs: vec![optional_param("maybe")],
                    outputs: vec![],
                    literals: NodeRuntimeValues::new(),
                },
            ],
            vec![Edge {
                source: "a".into(),
                source_output: "missing_output".into(),
                target: "b".into(),
                target_input: "maybe".into(),
            }],
        );
        let mut state = ExecutionState::new();
        state.apply_result(NodeExecutionResult::Completed {
            node_id: "a".into(),
            outputs: NodeRuntimeValues::new(),
            usage: 0,
        });

        assert!(infer_skip_reason("b", &wf, &state).is_none());
    }
}
