//! Postgres-backed `engine::store::ExecutionStore`.
//!
//! Organizational isolation is enforced in the `WHERE` clause of `get`/
//! `list`: a mismatched `organization_id` produces the same `None` a
//! missing id would.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use engine::error::EngineError;
use engine::state::{SkipReason, WorkflowExecutionStatus};
use engine::store::{ExecutionStore, ListFilter, NodeExecutionRecord, NodeRecordStatus, WorkflowExecutionRecord};

use crate::DbError;
use crate::models::{NodeExecutionRow, WorkflowExecutionRow};

fn status_str(status: WorkflowExecutionStatus) -> &'static str {
    match status {
        WorkflowExecutionStatus::Executing => "executing",
        WorkflowExecutionStatus::Completed => "completed",
        WorkflowExecutionStatus::Error => "error",
    }
}

fn parse_status(s: &str) -> WorkflowExecutionStatus {
    match s {
        "executing" => WorkflowExecutionStatus::Executing,
        "error" => WorkflowExecutionStatus::Error,
        _ => WorkflowExecutionStatus::Completed,
    }
}

fn node_status_str(status: NodeRecordStatus) -> &'static str {
    match status {
        NodeRecordStatus::Completed => "completed",
        NodeRecordStatus::Skipped => "skipped",
        NodeRecordStatus::Errored => "errored",
    }
}

fn parse_node_status(s: &str) -> NodeRecordStatus {
    match s {
        "skipped" => NodeRecordStatus::Skipped,
        "errored" => NodeRecordStatus::Errored,
        _ => NodeRecordStatus::Completed,
    }
}

fn skip_reason_str(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::UpstreamFailure => "upstream_failure",
        SkipReason::ConditionalBranch => "conditional_branch",
    }
}

fn parse_skip_reason(s: &str) -> SkipReason {
    match s {
        "conditional_branch" => SkipReason::ConditionalBranch,
        _ => SkipReason::UpstreamFailure,
    }
}

fn store_err(err: DbError) -> EngineError {
    EngineError::Store(Box::new(err))
}

fn row_to_record(row: WorkflowExecutionRow, nodes: Vec<NodeExecutionRow>) -> WorkflowExecutionRecord {
    WorkflowExecutionRecord {
        id: row.id,
        workflow_id: row.workflow_id,
        organization_id: row.organization_id,
        deployment_id: row.deployment_id,
        status: parse_status(&row.status),
        total_usage: row.total_usage as u64,
        started_at: row.started_at,
        ended_at: row.ended_at,
        node_executions: nodes.into_iter().map(node_row_to_record).collect(),
    }
}

fn node_row_to_record(row: NodeExecutionRow) -> NodeExecutionRecord {
    NodeExecutionRecord {
        node_id: row.node_id,
        status: parse_node_status(&row.status),
        inputs: serde_json::from_value(row.inputs).unwrap_or_default(),
        outputs: row.outputs.and_then(|v| serde_json::from_value(v).ok()),
        error: row.error,
        skip_reason: row.skip_reason.as_deref().map(parse_skip_reason),
        blocked_by: serde_json::from_value(row.blocked_by).unwrap_or_default(),
        usage: row.usage as u64,
    }
}

/// Postgres implementation of `ExecutionStore`. Persists the whole
/// execution record atomically in one `save` call rather than
/// incrementally across separate create/update/insert statements.
pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    async fn save(&self, record: WorkflowExecutionRecord) -> Result<WorkflowExecutionRecord, EngineError> {
        let mut tx = self.pool.begin().await.map_err(DbError::from).map_err(store_err)?;

        sqlx::query!(
            r#"
            INSERT INTO workflow_executions
                (id, workflow_id, organization_id, deployment_id, status, total_usage, started_at, ended_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                total_usage = EXCLUDED.total_usage,
                ended_at = EXCLUDED.ended_at
            "#,
            record.id,
            record.workflow_id,
            record.organization_id,
            record.deployment_id,
            status_str(record.status),
            record.total_usage as i64,
            record.started_at,
            record.ended_at,
        )
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)
        .map_err(store_err)?;

        // A retried execution rebuilds its full node_executions list from
        // scratch (`Scheduler::run` always starts from a blank
        // `ExecutionState`), so the prior attempt's rows must be cleared
        // before re-inserting or they'd accumulate duplicates per retry.
        sqlx::query!("DELETE FROM node_executions WHERE execution_id = $1", record.id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)
            .map_err(store_err)?;

        for node in &record.node_executions {
            let inputs: Value = serde_json::to_value(&node.inputs).unwrap_or(Value::Null);
            let outputs: Option<Value> = node.outputs.as_ref().map(|o| serde_json::to_value(o).unwrap_or(Value::Null));
            let skip_reason = node.skip_reason.map(skip_reason_str);
            let blocked_by = serde_json::to_value(&node.blocked_by).unwrap_or(Value::Array(vec![]));

            sqlx::query!(
                r#"
                INSERT INTO node_executions
                    (id, execution_id, node_id, status, inputs, outputs, error, skip_reason, blocked_by, usage)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
                Uuid::new_v4(),
                record.id,
                node.node_id,
                node_status_str(node.status),
                inputs,
                outputs,
                node.error,
                skip_reason,
                blocked_by,
                node.usage as i64,
            )
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(DbError::from).map_err(store_err)?;
        Ok(record)
    }

    async fn get(&self, id: Uuid, organization_id: &str) -> Result<Option<WorkflowExecutionRecord>, EngineError> {
        let row = sqlx::query_as!(
            WorkflowExecutionRow,
            r#"
            SELECT id, workflow_id, organization_id, deployment_id, status, total_usage, started_at, ended_at
            FROM workflow_executions
            WHERE id = $1 AND organization_id = $2
            "#,
            id,
            organization_id,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)
        .map_err(store_err)?;

        let Some(row) = row else { return Ok(None) };

        let nodes = sqlx::query_as!(
            NodeExecutionRow,
            r#"
            SELECT id, execution_id, node_id, status, inputs, outputs, error, skip_reason, blocked_by, usage
            FROM node_executions
            WHERE execution_id = $1
            "#,
            id,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)
        .map_err(store_err)?;

        Ok(Some(row_to_record(row, nodes)))
    }

    async fn list(&self, organization_id: &str, filter: ListFilter) -> Result<Vec<WorkflowExecutionRecord>, EngineError> {
        let limit = if filter.limit == 0 { 50 } else { filter.limit as i64 };
        let offset = filter.offset as i64;

        let rows = sqlx::query_as!(
            WorkflowExecutionRow,
            r#"
            SELECT id, workflow_id, organization_id, deployment_id, status, total_usage, started_at, ended_at
            FROM workflow_executions
            WHERE organization_id = $1
                AND ($2::uuid IS NULL OR workflow_id = $2)
                AND ($3::text IS NULL OR deployment_id = $3)
            ORDER BY ended_at DESC
            LIMIT $4 OFFSET $5
            "#,
            organization_id,
            filter.workflow_id,
            filter.deployment_id,
            limit,
            offset,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)
        .map_err(store_err)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let nodes = sqlx::query_as!(
                NodeExecutionRow,
                r#"
                SELECT id, execution_id, node_id, status, inputs, outputs, error, skip_reason, blocked_by, usage
                FROM node_executions
                WHERE execution_id = $1
                "#,
                row.id,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)
            .map_err(store_err)?;
            records.push(row_to_record(row, nodes));
        }

        Ok(records)
    }
}
