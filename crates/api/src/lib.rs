//! `api` crate — HTTP REST API layer
//!
//! Exposes:
//!   GET    /api/v1/workflows
//!   POST   /api/v1/workflows
//!   GET    /api/v1/workflows/:id
//!   DELETE /api/v1/workflows/:id
//!   POST   /api/v1/workflows/:id/execute
//!   GET    /api/v1/executions/:id
//!   GET    /api/v1/executions
//!   GET    /api/v1/executions/:id/stream   (SSE)
//!   POST   /webhook/:path
//!
//! `serve` spawns its own in-process queue worker alongside the HTTP
//! listener so a workflow submitted through this process can be watched
//! live over SSE — the worker and the API share one `Scheduler` and one
//! `ExecutionMonitor`. A separately-run `cli worker` process scales out
//! horizontally but can only be inspected by polling
//! `GET /executions/:id`, since its monitor broadcast channel is local to
//! that process.

pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use db::DbPool;
use engine::credit::CreditManager;
use engine::monitor::{BroadcastMonitor, ExecutionMonitor};
use engine::store::ExecutionStore;
use engine::Scheduler;
use nodes::object_store::{InMemoryObjectStore, ObjectStore};
use nodes::secrets::NoopSecretProvider;
use nodes::NodeRegistry;
use queue::Queue;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub queue: Arc<Queue>,
    pub store: Arc<dyn ExecutionStore>,
    pub monitor: Arc<dyn ExecutionMonitor>,
    pub object_store: Arc<dyn ObjectStore>,
}

/// Builds the shared scheduling stack one process-wide instance of, for
/// both the worker loop and (via `AppState`) the HTTP handlers.
fn build_scheduler(pool: DbPool, monitor: Arc<dyn ExecutionMonitor>, object_store: Arc<dyn ObjectStore>) -> Scheduler {
    let noop = Arc::new(NoopSecretProvider);
    Scheduler {
        registry: Arc::new(NodeRegistry::new(nodes::builtin::catalog())),
        runner: Arc::new(engine::step::DirectRunner::new(engine::step::StepConfig::default())),
        object_store,
        secret_provider: noop.clone(),
        integration_provider: noop,
        credit_manager: Arc::new(db::PgCreditManager::new(pool.clone())) as Arc<dyn CreditManager>,
        monitor,
    }
}

pub async fn serve(bind: &str, pool: DbPool) -> Result<(), std::io::Error> {
    let monitor: Arc<dyn ExecutionMonitor> = Arc::new(BroadcastMonitor::new(256));
    let object_store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
    let scheduler = Arc::new(build_scheduler(pool.clone(), monitor.clone(), object_store.clone()));
    let store: Arc<dyn ExecutionStore> = Arc::new(db::PgExecutionStore::new(pool.clone()));
    let job_queue = Arc::new(Queue::new(pool.clone()));

    tokio::spawn(queue::run_worker(
        job_queue.clone(),
        scheduler,
        store.clone(),
        queue::WorkerConfig {
            poll_interval: Duration::from_millis(500),
            max_attempts: 3,
        },
    ));

    let state = AppState {
        pool,
        queue: job_queue,
        store,
        monitor,
        object_store,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .route("/workflows", get(handlers::workflows::list).post(handlers::workflows::create))
        .route("/workflows/:id", get(handlers::workflows::get).delete(handlers::workflows::delete))
        .route("/workflows/:id/execute", post(handlers::executions::execute))
        .route("/executions", get(handlers::executions::list))
        .route("/executions/:id", get(handlers::executions::get))
        .route("/executions/:id/stream", get(handlers::executions::stream));

    let app = Router::new()
        .nest("/api/v1", api_router)
        .route("/webhook/:path", post(handlers::webhooks::handle_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}

pub(crate) use engine::marshal::inject_entry_inputs as inject_request_input;
