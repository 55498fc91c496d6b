//! `queue` crate — the durable job queue backing `cli worker` and the
//! embedded worker `api::serve` spawns.
//!
//! Wraps `db::repository::jobs`'s `job_queue` table (`SELECT ... FOR UPDATE
//! SKIP LOCKED` polling) with typed payloads: a job's `payload` column is a
//! serialized `engine::RuntimeParams` snapshot, so a worker can poll,
//! deserialize, and hand straight to `engine::facade::run_workflow` without
//! the caller re-assembling the request.

pub mod error;
pub mod worker;

use db::models::JobRow;
use db::DbPool;
use engine::RuntimeParams;
use uuid::Uuid;

pub use error::QueueError;
pub use worker::{run_worker, WorkerConfig};

/// A job popped off the queue, with its payload already decoded.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub row: JobRow,
    pub params: RuntimeParams,
}

/// Thin façade over `db::repository::jobs` that speaks `RuntimeParams`
/// instead of raw JSON.
pub struct Queue {
    pool: DbPool,
}

impl Queue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Enqueue a workflow run. `execution_id` should be minted by the
    /// caller up front so it can be returned to the client immediately
    /// while the worker fills it in later.
    pub async fn enqueue(&self, execution_id: Uuid, params: &RuntimeParams) -> Result<JobRow, QueueError> {
        let payload = serde_json::to_value(params)?;
        let row = db::repository::jobs::enqueue_job(&self.pool, execution_id, params.workflow.id, payload).await?;
        Ok(row)
    }

    /// Atomically claim the oldest pending job, if any.
    pub async fn poll_next(&self) -> Result<Option<QueuedJob>, QueueError> {
        let Some(row) = db::repository::jobs::fetch_next_job(&self.pool).await? else {
            return Ok(None);
        };
        let params: RuntimeParams = serde_json::from_value(row.payload.clone())?;
        Ok(Some(QueuedJob { row, params }))
    }

    pub async fn complete(&self, job_id: Uuid) -> Result<(), QueueError> {
        db::repository::jobs::complete_job(&self.pool, job_id).await?;
        Ok(())
    }

    pub async fn fail(&self, job_id: Uuid, max_attempts: i32) -> Result<(), QueueError> {
        db::repository::jobs::fail_job(&self.pool, job_id, max_attempts).await?;
        Ok(())
    }
}
