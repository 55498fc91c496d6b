//! Typed error type for the queue crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("db error: {0}")]
    Db(#[from] db::DbError),

    #[error("job payload is not a valid RuntimeParams snapshot: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("engine error: {0}")]
    Engine(#[from] engine::EngineError),
}
