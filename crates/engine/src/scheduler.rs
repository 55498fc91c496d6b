//! Level-by-level orchestration.
//!
//! Each level is dispatched concurrently (`futures::future::join_all`);
//! results are applied to `ExecutionState` strictly in workflow-declared
//! order by the single task running `Scheduler::run` — parallel within a
//! level, serialized between levels.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use nodes::object_store::ObjectStore;
use nodes::secrets::{IntegrationProvider, SecretProvider};
use nodes::{NodeRegistry, RuntimeMode};

use crate::credit::{CreditCheck, CreditManager, SubscriptionStatus};
use crate::dag;
use crate::error::EngineError;
use crate::executor::{execute_one, ExecutorEnv};
use crate::models::Workflow;
use crate::monitor::{ExecutionMonitor, NodeSnapshot, NodeSnapshotStatus, Snapshot};
use crate::state::{ExecutionState, NodeExecutionResult, SkipReason, WorkflowExecutionContext, WorkflowExecutionStatus};
use crate::step::StepRunner;
use crate::store::{NodeExecutionRecord, NodeRecordStatus, WorkflowExecutionRecord};

/// Everything needed to run one workflow execution, bundling the shared,
/// process-wide services the façade constructs once from `RuntimeParams`,
/// minus the graph/identity fields the caller supplies separately to
/// `Scheduler::run`.
pub struct Scheduler {
    pub registry: Arc<NodeRegistry>,
    pub runner: Arc<dyn StepRunner>,
    pub object_store: Arc<dyn ObjectStore>,
    pub secret_provider: Arc<dyn SecretProvider>,
    pub integration_provider: Arc<dyn IntegrationProvider>,
    pub credit_manager: Arc<dyn CreditManager>,
    pub monitor: Arc<dyn ExecutionMonitor>,
}

/// Per-execution identity and credit parameters — the parts of
/// `RuntimeParams` that vary per run rather than per process.
pub struct RunRequest {
    pub workflow: Workflow,
    pub organization_id: String,
    pub execution_id: Uuid,
    pub deployment_id: Option<String>,
    pub compute_credits: u64,
    pub subscription_status: SubscriptionStatus,
    pub dev_mode: bool,
    pub env: Value,
}

impl Scheduler {
    #[instrument(skip(self, request), fields(execution_id = %request.execution_id))]
    pub async fn run(&self, request: RunRequest) -> Result<WorkflowExecutionRecord, EngineError> {
        let (levels, ordered) = dag::plan(&request.workflow)?;
        let context = WorkflowExecutionContext {
            workflow_id: request.workflow.id,
            workflow: request.workflow,
            execution_levels: levels,
            ordered_node_ids: ordered,
            organization_id: request.organization_id.clone(),
            execution_id: request.execution_id,
            deployment_id: request.deployment_id.clone(),
        };

        let estimated_usage: u64 = context
            .workflow
            .nodes
            .iter()
            .filter_map(|node| self.registry.get_node_type(&node.node_type).ok())
            .map(|meta| meta.usage)
            .sum();

        let has_subscription = matches!(request.subscription_status, SubscriptionStatus::Active { .. });
        let credit_check = CreditCheck {
            organization_id: request.organization_id.clone(),
            compute_credits: request.compute_credits,
            estimated_usage,
            subscription_status: request.subscription_status,
            dev_mode: request.dev_mode,
        };

        if !self.credit_manager.has_enough(&credit_check).await? {
            return Err(EngineError::InsufficientCredits { organization_id: request.organization_id });
        }

        let started_at = Utc::now();
        let mut state = ExecutionState::new();
        self.monitor.broadcast(initial_snapshot(&context));

        let env = ExecutorEnv {
            registry: self.registry.clone(),
            runner: self.runner.clone(),
            object_store: self.object_store.clone(),
            secret_provider: self.secret_provider.clone(),
            integration_provider: self.integration_provider.clone(),
            mode: if request.dev_mode { RuntimeMode::Dev } else { RuntimeMode::Prod },
            env: request.env.clone(),
            has_subscription,
            on_progress: None,
        };

        let mut echoed_inputs: HashMap<String, nodes::value::NodeRuntimeValues> = HashMap::new();

        for level in &context.execution_levels {
            let attempts = join_all(level.iter().map(|node_id| execute_one(&context, &state, node_id, &env))).await;

            // Apply in workflow-declared (= level) order — the single-writer
            // discipline `ExecutionState::apply_result` depends on.
            for attempt in attempts {
                echoed_inputs.insert(attempt.result.node_id().to_string(), attempt.inputs);
                state.apply_result(attempt.result);
            }

            self.monitor.broadcast(snapshot_from_state(&context, &state));
        }

        let status = crate::state::status_of(&context, &state);
        let total_usage = state.total_usage();
        self.credit_manager.record(&context.organization_id, total_usage).await?;

        let node_executions = build_node_records(&context, &state, &echoed_inputs);
        let record = WorkflowExecutionRecord {
            id: context.execution_id,
            workflow_id: context.workflow_id,
            organization_id: context.organization_id.clone(),
            deployment_id: context.deployment_id.clone(),
            status,
            node_executions,
            total_usage,
            started_at,
            ended_at: Utc::now(),
        };

        self.monitor.broadcast(final_snapshot(&context, &state, status));

        Ok(record)
    }
}

fn initial_snapshot(context: &WorkflowExecutionContext) -> Snapshot {
    let nodes = context
        .ordered_node_ids
        .iter()
        .map(|id| {
            (
                id.clone(),
                NodeSnapshot { status: NodeSnapshotStatus::Pending, outputs: None, error: None, skip_reason: None },
            )
        })
        .collect();
    Snapshot { execution_id: context.execution_id, status: WorkflowExecutionStatus::Executing, nodes }
}

fn snapshot_from_state(context: &WorkflowExecutionContext, state: &ExecutionState) -> Snapshot {
    final_snapshot(context, state, WorkflowExecutionStatus::Executing)
}

fn final_snapshot(context: &WorkflowExecutionContext, state: &ExecutionState, status: WorkflowExecutionStatus) -> Snapshot {
    let nodes = context
        .ordered_node_ids
        .iter()
        .map(|id| {
            let snapshot = if let Some(outputs) = state.node_outputs().get(id) {
                NodeSnapshot {
                    status: NodeSnapshotStatus::Completed,
                    outputs: Some(outputs.clone()),
                    error: None,
                    skip_reason: None,
                }
            } else if let Some(error) = state.node_errors().get(id) {
                NodeSnapshot {
                    status: NodeSnapshotStatus::Errored,
                    outputs: None,
                    error: Some(error.clone()),
                    skip_reason: None,
                }
            } else if let Some((reason, _)) = state.skip_reason_of(id) {
                NodeSnapshot {
                    status: NodeSnapshotStatus::Skipped,
                    outputs: None,
                    error: None,
                    skip_reason: Some(*reason),
                }
            } else {
                NodeSnapshot { status: NodeSnapshotStatus::Pending, outputs: None, error: None, skip_reason: None }
            };
            (id.clone(), snapshot)
        })
        .collect();
    Snapshot { execution_id: context.execution_id, status, nodes }
}

fn build_node_records(
    context: &WorkflowExecutionContext,
    state: &ExecutionState,
    echoed_inputs: &HashMap<String, nodes::value::NodeRuntimeValues>,
) -> Vec<NodeExecutionRecord> {
    context
        .ordered_node_ids
        .iter()
        .map(|id| {
            let inputs = echoed_inputs.get(id).cloned().unwrap_or_default();
            if let Some(outputs) = state.node_outputs().get(id) {
                NodeExecutionRecord {
                    node_id: id.clone(),
                    status: NodeRecordStatus::Completed,
                    inputs,
                    outputs: Some(outputs.clone()),
                    error: None,
                    skip_reason: None,
                    blocked_by: Vec::new(),
                    usage: *state.node_usage().get(id).unwrap_or(&0),
                }
            } else if let Some(error) = state.node_errors().get(id) {
                NodeExecutionRecord {
                    node_id: id.clone(),
                    status: NodeRecordStatus::Errored,
                    inputs,
                    outputs: None,
                    error: Some(error.clone()),
                    skip_reason: None,
                    blocked_by: Vec::new(),
                    usage: *state.node_usage().get(id).unwrap_or(&0),
                }
            } else {
                let (reason, blocked_by): (Option<SkipReason>, Vec<String>) = match state.skip_reason_of(id) {
                    Some((reason, blocked_by)) => (Some(*reason), blocked_by.clone()),
                    None => (None, Vec::new()),
                };
                NodeExecutionRecord {
                    node_id: id.clone(),
                    status: NodeRecordStatus::Skipped,
                    inputs,
                    outputs: None,
                    error: None,
                    skip_reason: reason,
                    blocked_by,
                    usage: 0,
                }
            }
        })
        .collect()
}
