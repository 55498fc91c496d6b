//! Workflow CRUD operations.

use sqlx::PgPool;
use uuid::Uuid;

use engine::Workflow;

use crate::{models::WorkflowRow, DbError};

/// Default execution budget recorded alongside a workflow definition —
/// used by webhook/cron triggers, which have no interactive caller to
/// supply `RuntimeParams` credit fields per request.
pub struct CreditDefaults {
    pub compute_credits: i64,
    pub subscription_status: Option<String>,
    pub overage_limit: Option<i64>,
}

/// Insert a workflow, keyed by its own `Workflow::id`/`name` rather than
/// minting a fresh id — the domain type is the source of truth, this table
/// is just its durable form.
pub async fn create_workflow(
    pool: &PgPool,
    organization_id: &str,
    workflow: &Workflow,
    credits: CreditDefaults,
) -> Result<WorkflowRow, DbError> {
    let definition = serde_json::to_value(workflow).expect("Workflow always serializes");

    let row = sqlx::query_as!(
        WorkflowRow,
        r#"
        INSERT INTO workflows
            (id, name, organization_id, definition, compute_credits, subscription_status, overage_limit, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, name, organization_id, definition, compute_credits, subscription_status, overage_limit, created_at
        "#,
        workflow.id,
        workflow.name,
        organization_id,
        definition,
        credits.compute_credits,
        credits.subscription_status,
        credits.overage_limit,
        workflow.created_at,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single workflow row by its primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowRow,
        r#"
        SELECT id, name, organization_id, definition, compute_credits, subscription_status, overage_limit, created_at
        FROM workflows WHERE id = $1
        "#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Deserialize a row's `definition` column back into the domain type.
pub fn row_to_workflow(row: &WorkflowRow) -> Result<Workflow, DbError> {
    serde_json::from_value(row.definition.clone()).map_err(|e| DbError::Sqlx(sqlx::Error::Decode(Box::new(e))))
}

/// Return all workflows for an organization, ordered by creation time
/// (newest first).
pub async fn list_workflows(pool: &PgPool, organization_id: &str) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as!(
        WorkflowRow,
        r#"
        SELECT id, name, organization_id, definition, compute_credits, subscription_status, overage_limit, created_at
        FROM workflows WHERE organization_id = $1 ORDER BY created_at DESC
        "#,
        organization_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Return every workflow across all organizations — used only to resolve
/// an inbound webhook, which carries no tenant header to scope the lookup
/// by.
pub async fn list_all_workflows(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as!(
        WorkflowRow,
        r#"
        SELECT id, name, organization_id, definition, compute_credits, subscription_status, overage_limit, created_at
        FROM workflows
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Permanently delete a workflow by its primary key.
///
/// Returns `DbError::NotFound` if no row was deleted.
pub async fn delete_workflow(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query!("DELETE FROM workflows WHERE id = $1", id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
