//! Single entry point into the engine — `RuntimeParams` in,
//! `WorkflowExecutionRecord` out. `api`, `cli`, and the queue worker all call
//! through here rather than constructing a `Scheduler` themselves.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::credit::SubscriptionStatus;
use crate::error::EngineError;
use crate::models::Workflow;
use crate::scheduler::{RunRequest, Scheduler};
use crate::store::{ExecutionStore, WorkflowExecutionRecord};

/// The wire shape of a workflow run request. `subscription_status` is the
/// wire-friendly `"trial" | "active"` tag; `overage_limit` only applies
/// when active. Absent `subscription_status` defaults to `"trial"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeParams {
    pub workflow: Workflow,
    pub user_id: String,
    pub organization_id: String,
    pub compute_credits: u64,
    #[serde(default)]
    pub subscription_status: Option<String>,
    #[serde(default)]
    pub overage_limit: Option<u64>,
    #[serde(default)]
    pub deployment_id: Option<String>,
    #[serde(default)]
    pub monitor_progress: bool,
    /// Not part of the wire format; `dev` mode bypasses credit checks
    /// and is set by the CLI's `run` command, never by `api`.
    #[serde(default, skip)]
    pub dev_mode: bool,
    #[serde(default, skip)]
    pub env: Value,
}

impl RuntimeParams {
    fn subscription_status(&self) -> SubscriptionStatus {
        match self.subscription_status.as_deref() {
            Some("active") => SubscriptionStatus::Active { overage_limit: self.overage_limit },
            _ => SubscriptionStatus::Trial,
        }
    }
}

/// Run a workflow end to end: validate, schedule, persist, return the
/// record. `execution_id` is supplied by the caller rather than minted here
/// — `api`'s execute/webhook handlers allocate it up front (so they can
/// hand it back to the client before the job runs) and the queue worker
/// threads the same id through from the job row.
#[instrument(skip(scheduler, store, params), fields(organization_id = %params.organization_id, %execution_id))]
pub async fn run_workflow(
    scheduler: &Scheduler,
    store: &dyn ExecutionStore,
    execution_id: Uuid,
    params: RuntimeParams,
) -> Result<WorkflowExecutionRecord, EngineError> {
    let subscription_status = params.subscription_status();

    let request = RunRequest {
        workflow: params.workflow,
        organization_id: params.organization_id,
        execution_id,
        deployment_id: params.deployment_id,
        compute_credits: params.compute_credits,
        subscription_status,
        dev_mode: params.dev_mode,
        env: params.env,
    };

    let record = scheduler.run(request).await?;
    store.save(record.clone()).await?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::InMemoryCreditManager;
    use crate::models::{NodeSpec, Trigger};
    use crate::monitor::BroadcastMonitor;
    use crate::state::WorkflowExecutionStatus;
    use crate::step::{DirectRunner, StepConfig};
    use crate::store::InMemoryExecutionStore;
    use nodes::mock::MockNode;
    use nodes::object_store::InMemoryObjectStore;
    use nodes::secrets::NoopSecretProvider;
    use nodes::value::NodeRuntimeValues;
    use nodes::NodeRegistry;
    use std::sync::Arc;

    fn scheduler(registry: NodeRegistry) -> Scheduler {
        let noop = Arc::new(NoopSecretProvider);
        Scheduler {
            registry: Arc::new(registry),
            runner: Arc::new(DirectRunner::new(StepConfig { max_retries: 0, ..StepConfig::default() })),
            object_store: Arc::new(InMemoryObjectStore::new()),
            secret_provider: noop.clone(),
            integration_provider: noop,
            credit_manager: Arc::new(InMemoryCreditManager::new()),
            monitor: Arc::new(BroadcastMonitor::new(16)),
        }
    }

    fn workflow() -> Workflow {
        let mock = MockNode::returning("echo", serde_json::json!({"value": 1}));
        let workflow = Workflow::new(
            "h",
            "n",
            Trigger::Manual,
            vec![NodeSpec {
                id: "a".into(),
                node_type: "echo".into(),
                inputs: vec![],
                outputs: vec![],
                literals: NodeRuntimeValues::new(),
            }],
            vec![],
        );
        let _ = mock;
        workflow
    }

    #[tokio::test]
    async fn run_workflow_persists_and_returns_the_record() {
        let mock = MockNode::returning("echo", serde_json::json!({"value": 1}));
        let scheduler = scheduler(NodeRegistry::new(vec![Arc::new(mock)]));
        let store = InMemoryExecutionStore::new();

        let params = RuntimeParams {
            workflow: workflow(),
            user_id: "user_1".into(),
            organization_id: "org_1".into(),
            compute_credits: 100,
            subscription_status: Some("active".into()),
            overage_limit: None,
            deployment_id: None,
            monitor_progress: false,
            dev_mode: false,
            env: Value::Null,
        };

        let record = run_workflow(&scheduler, &store, Uuid::new_v4(), params).await.unwrap();
        assert_eq!(record.status, WorkflowExecutionStatus::Completed);

        let fetched = store.get(record.id, "org_1").await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn default_subscription_status_is_trial() {
        let mock = MockNode::returning_outputs("costly", NodeRuntimeValues::new(), 50);
        let scheduler = scheduler(NodeRegistry::new(vec![Arc::new(mock)]));
        let store = InMemoryExecutionStore::new();

        let mut wf = workflow();
        wf.nodes[0].node_type = "costly".into();

        let params = RuntimeParams {
            workflow: wf,
            user_id: "user_1".into(),
            organization_id: "org_1".into(),
            compute_credits: 10,
            subscription_status: None,
            overage_limit: None,
            deployment_id: None,
            monitor_progress: false,
            dev_mode: false,
            env: Value::Null,
        };

        let err = run_workflow(&scheduler, &store, Uuid::new_v4(), params).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientCredits { .. }));
    }
}
