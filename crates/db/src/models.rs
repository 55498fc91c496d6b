//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow definition row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    pub organization_id: String,
    /// Full JSON workflow definition (nodes, edges, trigger, …)
    pub definition: serde_json::Value,
    /// Default execution budget for triggers with no interactive caller
    /// (webhook, cron); `execute` may override these per request.
    pub compute_credits: i64,
    pub subscription_status: Option<String>,
    pub overage_limit: Option<i64>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// A persisted workflow execution row — mirrors
/// `engine::store::WorkflowExecutionRecord` minus its `node_executions`,
/// which live in their own table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowExecutionRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub organization_id: String,
    pub deployment_id: Option<String>,
    pub status: String,
    pub total_usage: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// A persisted node execution row — mirrors
/// `engine::store::NodeExecutionRecord`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeExecutionRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub status: String,
    pub inputs: serde_json::Value,
    pub outputs: Option<serde_json::Value>,
    pub error: Option<String>,
    pub skip_reason: Option<String>,
    /// Node ids the skip classifier blamed, as a JSON array; empty/absent
    /// unless `status` is `skipped`.
    pub blocked_by: serde_json::Value,
    pub usage: i64,
}

// ---------------------------------------------------------------------------
// org_credit_usage
// ---------------------------------------------------------------------------

/// Running compute-credit total for one organization.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditUsageRow {
    pub organization_id: String,
    pub current_usage: i64,
}

// ---------------------------------------------------------------------------
// secrets
// ---------------------------------------------------------------------------

/// A persisted secret row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecretRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub key: String,
    /// AES-256 encrypted value (base64-encoded ciphertext).
    pub encrypted_value: String,
}

// ---------------------------------------------------------------------------
// job_queue
// ---------------------------------------------------------------------------

/// A job row fetched from the queue table. `status` is one of `pending`/
/// `processing`/`completed`/`failed`/`dead_lettered` — kept as a plain
/// `String` rather than an enum since every call site (`repository::jobs`)
/// already matches on the literal in SQL; a parallel Rust enum never
/// constructed anywhere is just drift waiting to happen.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
