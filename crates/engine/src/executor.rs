//! Single-node execution.
//!
//! `execute_one` is pure with respect to `ExecutionState`: it reads a
//! snapshot and returns an immutable [`NodeExecutionResult`]; only the
//! scheduler applies it. This is what lets the scheduler launch every node
//! in a level concurrently without a lock on the state.

use std::sync::Arc;
use std::collections::BTreeMap;

use serde_json::Value;
use tracing::instrument;

use nodes::object_store::ObjectStore;
use nodes::secrets::{IntegrationProvider, SecretProvider};
use nodes::value::{NodeRuntimeValues, ParameterValue, RuntimeValue};
use nodes::{NodeContext, NodeRegistry, RuntimeMode};

use crate::skip;
use crate::state::{ExecutionState, NodeExecutionResult, WorkflowExecutionContext};
use crate::step::{StepFuture, StepRunner};

/// Everything `execute_one` needs beyond the immutable execution context
/// and state snapshot — constructed per-node; object store, secret
/// provider, and integration provider are shared read-only services.
pub struct ExecutorEnv {
    pub registry: Arc<NodeRegistry>,
    pub runner: Arc<dyn StepRunner>,
    pub object_store: Arc<dyn ObjectStore>,
    pub secret_provider: Arc<dyn SecretProvider>,
    pub integration_provider: Arc<dyn IntegrationProvider>,
    pub mode: RuntimeMode,
    pub env: Value,
    pub has_subscription: bool,
    pub on_progress: Option<nodes::traits::ProgressFn>,
}

/// A node's settled result paired with the inputs it was (or would have
/// been) invoked with, so the scheduler can echo them onto the persisted
/// record without recomputing the gather step.
#[derive(Debug, Clone)]
pub struct NodeAttempt {
    pub result: NodeExecutionResult,
    pub inputs: NodeRuntimeValues,
}

/// Run exactly one node to completion (or to a skip/error verdict), without
/// ever mutating `state`.
#[instrument(skip(context, state, env), fields(node_id = %node_id))]
pub async fn execute_one(
    context: &WorkflowExecutionContext,
    state: &ExecutionState,
    node_id: &str,
    env: &ExecutorEnv,
) -> NodeAttempt {
    let node = match context.workflow.node(node_id) {
        Some(node) => node,
        None => {
            return NodeAttempt {
                result: NodeExecutionResult::Errored {
                    node_id: node_id.to_string(),
                    error: "node not found".to_string(),
                    usage: 0,
                },
                inputs: NodeRuntimeValues::new(),
            }
        }
    };

    let executable = match env.registry.create_executable(&node.node_type) {
        Some(executable) => executable,
        None => {
            return NodeAttempt {
                result: NodeExecutionResult::Errored {
                    node_id: node_id.to_string(),
                    error: format!("node type '{}' not implemented", node.node_type),
                    usage: 0,
                },
                inputs: NodeRuntimeValues::new(),
            }
        }
    };
    let meta = executable.node_type();

    // --- Gather inputs: literal defaults, then inbound edges, fan-in in edge order. ---
    let mut fed: BTreeMap<String, Vec<RuntimeValue>> = BTreeMap::new();
    for edge in context.workflow.inbound_edges(node_id) {
        if let Some(value) = state
            .node_outputs()
            .get(edge.source.as_str())
            .and_then(|outputs| outputs.get(edge.source_output.as_str()))
        {
            fed.entry(edge.target_input.clone()).or_default().extend(value.clone().into_vec());
        }
    }

    let mut inputs: NodeRuntimeValues = node.literals.clone();
    for (name, mut values) in fed {
        let value = if values.len() == 1 {
            ParameterValue::Single(values.remove(0))
        } else {
            ParameterValue::Many(values)
        };
        inputs.insert(name, value);
    }

    // --- Required-input-missing classification. ---
    for input_spec in &node.inputs {
        if input_spec.required && !inputs.contains_key(&input_spec.name) {
            let result = match skip::infer_skip_reason(node_id, &context.workflow, state) {
                Some((reason, blocked_by)) => {
                    NodeExecutionResult::Skipped { node_id: node_id.to_string(), reason, blocked_by }
                }
                None => NodeExecutionResult::Errored {
                    node_id: node_id.to_string(),
                    error: format!("missing required input '{}'", input_spec.name),
                    usage: 0,
                },
            };
            return NodeAttempt { result, inputs };
        }
    }

    // --- Credit gate. ---
    if meta.subscription_only && !env.has_subscription {
        return NodeAttempt {
            result: NodeExecutionResult::Errored {
                node_id: node_id.to_string(),
                error: "Subscription required".to_string(),
                usage: 0,
            },
            inputs,
        };
    }

    // --- Invoke via the step runner. ---
    let workflow_id = context.workflow.id.to_string();
    let organization_id = context.organization_id.clone();
    let execution_id = context.execution_id.to_string();
    let mode = env.mode;
    let object_store = env.object_store.clone();
    let secret_provider = env.secret_provider.clone();
    let integration_provider = env.integration_provider.clone();
    let node_env = env.env.clone();
    let on_progress = env.on_progress.clone();
    let echoed_inputs = inputs.clone();

    let step_name = format!("run node {node_id}");
    let make_future = move || -> StepFuture<'_> {
        let ctx = NodeContext::new(
            node_id.to_string(),
            workflow_id.clone(),
            organization_id.clone(),
            execution_id.clone(),
            mode,
            inputs.clone(),
            node_env.clone(),
            object_store.clone(),
            secret_provider.clone(),
            integration_provider.clone(),
            on_progress.clone(),
        );
        let executable = executable.clone();
        Box::pin(async move { executable.execute(ctx).await })
    };

    let result = match env.runner.step(&step_name, &make_future).await {
        Ok(outcome) => NodeExecutionResult::Completed {
            node_id: node_id.to_string(),
            outputs: outcome.outputs,
            usage: outcome.usage,
        },
        Err(failure) => NodeExecutionResult::Errored {
            node_id: node_id.to_string(),
            error: failure.message,
            usage: 0,
        },
    };

    NodeAttempt { result, inputs: echoed_inputs }
}
