//! Execution persistence seam.
//!
//! `ExecutionStore` is defined here, not in `db`, so `engine` never depends
//! on a concrete persistence backend — `db` depends on `engine` and
//! implements this trait against Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nodes::value::NodeRuntimeValues;

use crate::error::EngineError;
use crate::state::{SkipReason, WorkflowExecutionStatus};

/// Per-node record persisted alongside the workflow execution: inputs
/// echoed back, outputs, error, skip reason, and usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecutionRecord {
    pub node_id: String,
    pub status: NodeRecordStatus,
    pub inputs: NodeRuntimeValues,
    pub outputs: Option<NodeRuntimeValues>,
    pub error: Option<String>,
    pub skip_reason: Option<SkipReason>,
    /// Upstream node ids the skip classifier blamed for this node not
    /// running — empty unless `status` is `Skipped`.
    #[serde(default)]
    pub blocked_by: Vec<String>,
    pub usage: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRecordStatus {
    Completed,
    Skipped,
    Errored,
}

/// The full, immutable record of one workflow execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecutionRecord {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub organization_id: String,
    pub deployment_id: Option<String>,
    pub status: WorkflowExecutionStatus,
    pub node_executions: Vec<NodeExecutionRecord>,
    pub total_usage: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Filter for `list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub workflow_id: Option<Uuid>,
    pub deployment_id: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist the full execution. Must survive concurrent writes for
    /// distinct ids without corruption; a subsequent `get` of the same id
    /// must observe it immediately (read-your-writes).
    async fn save(&self, record: WorkflowExecutionRecord) -> Result<WorkflowExecutionRecord, EngineError>;

    /// Organizational isolation is enforced here: a mismatched
    /// `organization_id` is indistinguishable from a missing id.
    async fn get(&self, id: Uuid, organization_id: &str) -> Result<Option<WorkflowExecutionRecord>, EngineError>;

    /// Ordered by `ended_at` descending. Eventual consistency permitted.
    async fn list(&self, organization_id: &str, filter: ListFilter) -> Result<Vec<WorkflowExecutionRecord>, EngineError>;
}

/// `DashMap`-backed store for façade-direct usage and unit tests — no
/// Postgres required.
#[derive(Default)]
pub struct InMemoryExecutionStore {
    records: DashMap<Uuid, WorkflowExecutionRecord>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn save(&self, record: WorkflowExecutionRecord) -> Result<WorkflowExecutionRecord, EngineError> {
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid, organization_id: &str) -> Result<Option<WorkflowExecutionRecord>, EngineError> {
        Ok(self
            .records
            .get(&id)
            .filter(|r| r.organization_id == organization_id)
            .map(|r| r.value().clone()))
    }

    async fn list(&self, organization_id: &str, filter: ListFilter) -> Result<Vec<WorkflowExecutionRecord>, EngineError> {
        let mut matching: Vec<WorkflowExecutionRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|r| r.organization_id == organization_id)
            .filter(|r| filter.workflow_id.map_or(true, |id| id == r.workflow_id))
            .filter(|r| filter.deployment_id.as_ref().map_or(true, |id| Some(id) == r.deployment_id.as_ref()))
            .collect();

        matching.sort_by(|a, b| b.ended_at.cmp(&a.ended_at));

        let offset = filter.offset as usize;
        let limit = if filter.limit == 0 { matching.len() } else { filter.limit as usize };
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: Uuid, organization_id: &str, ended_at: DateTime<Utc>) -> WorkflowExecutionRecord {
        WorkflowExecutionRecord {
            id,
            workflow_id: Uuid::new_v4(),
            organization_id: organization_id.to_string(),
            deployment_id: None,
            status: WorkflowExecutionStatus::Completed,
            node_executions: vec![],
            total_usage: 0,
            started_at: ended_at,
            ended_at,
        }
    }

    #[tokio::test]
    async fn mismatched_organization_is_indistinguishable_from_not_found() {
        let store = InMemoryExecutionStore::new();
        let id = Uuid::new_v4();
        store.save(record(id, "org_a", Utc::now())).await.unwrap();

        assert!(store.get(id, "org_b").await.unwrap().is_none());
        assert!(store.get(Uuid::new_v4(), "org_a").await.unwrap().is_none());
        assert!(store.get(id, "org_a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_is_ordered_by_ended_at_descending() {
        let store = InMemoryExecutionStore::new();
        let now = Utc::now();
        let older = record(Uuid::new_v4(), "org_a", now - Duration::minutes(10));
        let newer = record(Uuid::new_v4(), "org_a", now);
        store.save(older.clone()).await.unwrap();
        store.save(newer.clone()).await.unwrap();

        let listed = store.list("org_a", ListFilter::default()).await.unwrap();
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }

    #[tokio::test]
    async fn read_your_writes() {
        let store = InMemoryExecutionStore::new();
        let id = Uuid::new_v4();
        let saved = store.save(record(id, "org_a", Utc::now())).await.unwrap();
        let fetched = store.get(saved.id, "org_a").await.unwrap().expect("just written");
        assert_eq!(fetched.id, saved.id);
    }
}
