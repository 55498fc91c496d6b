//! Polling worker loop — `cli worker` drives this.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use engine::store::ExecutionStore;
use engine::Scheduler;

use crate::{Queue, QueueError};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub max_attempts: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            max_attempts: 3,
        }
    }
}

/// Poll forever, running at most one job at a time. Returns only if the
/// queue itself errors unrecoverably (e.g. the pool is gone); a single
/// job's failure is caught and turned into a `fail` call, not propagated.
pub async fn run_worker(
    queue: Arc<Queue>,
    scheduler: Arc<Scheduler>,
    store: Arc<dyn ExecutionStore>,
    config: WorkerConfig,
) -> Result<(), QueueError> {
    loop {
        match queue.poll_next().await {
            Ok(Some(job)) => {
                process_job(&queue, &scheduler, store.as_ref(), job, config.max_attempts).await;
            }
            Ok(None) => {
                tokio::time::sleep(config.poll_interval).await;
            }
            Err(err) => {
                error!("failed to poll job queue: {err}");
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }
}

#[instrument(skip(queue, scheduler, store, job), fields(job_id = %job.row.id, execution_id = %job.row.execution_id))]
async fn process_job(
    queue: &Queue,
    scheduler: &Scheduler,
    store: &dyn ExecutionStore,
    job: crate::QueuedJob,
    max_attempts: i32,
) {
    info!("processing queued workflow execution");

    match engine::facade::run_workflow(scheduler, store, job.row.execution_id, job.params).await {
        Ok(record) => {
            info!(status = ?record.status, "execution finished");
            if let Err(err) = queue.complete(job.row.id).await {
                error!("failed to mark job {} complete: {err}", job.row.id);
            }
        }
        Err(err) => {
            warn!("execution failed: {err}");
            if let Err(err) = queue.fail(job.row.id, max_attempts).await {
                error!("failed to mark job {} failed: {err}", job.row.id);
            }
        }
    }
}
