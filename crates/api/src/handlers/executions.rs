use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::Value;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use db::repository::workflows as wf_repo;
use engine::monitor::ExecutionMonitor;
use engine::store::{ExecutionStore, ListFilter};
use engine::{RuntimeParams, Workflow};

use super::{organization_header, AppState};
use crate::inject_request_input;

#[derive(Deserialize)]
pub struct ExecuteWorkflowDto {
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Enqueues a run rather than executing inline — the in-process worker
/// spawned by `serve` picks it up, so the client gets back an
/// `execution_id` immediately and polls or streams for the result.
pub async fn execute(
    Path(id): Path<Uuid>,
    headers: axum::http::HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<ExecuteWorkflowDto>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let row = match wf_repo::get_workflow(&state.pool, id).await {
        Ok(row) => row,
        Err(db::DbError::NotFound) => return Err(StatusCode::NOT_FOUND),
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let organization_id = headers
        .get("x-organization-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| row.organization_id.clone());

    let mut workflow: Workflow = wf_repo::row_to_workflow(&row).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    inject_request_input(&mut workflow, &payload.input, state.object_store.as_ref())
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let execution_id = Uuid::new_v4();
    let params = RuntimeParams {
        workflow,
        user_id: payload.user_id.unwrap_or_else(|| "api".to_string()),
        organization_id,
        compute_credits: row.compute_credits.max(0) as u64,
        subscription_status: row.subscription_status.clone(),
        overage_limit: row.overage_limit.map(|v| v.max(0) as u64),
        deployment_id: None,
        monitor_progress: true,
        dev_mode: false,
        env: Value::Null,
    };

    state
        .queue
        .enqueue(execution_id, &params)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "execution_id": execution_id }))))
}

pub async fn get(
    Path(id): Path<Uuid>,
    headers: axum::http::HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<engine::store::WorkflowExecutionRecord>, StatusCode> {
    let organization_id = organization_header(&headers)?;
    match state.store.get(id, &organization_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(Deserialize)]
pub struct ListExecutionsQuery {
    pub workflow_id: Option<Uuid>,
    pub deployment_id: Option<String>,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

pub async fn list(
    headers: axum::http::HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<ListExecutionsQuery>,
) -> Result<Json<Vec<engine::store::WorkflowExecutionRecord>>, StatusCode> {
    let organization_id = organization_header(&headers)?;
    let filter = ListFilter {
        workflow_id: query.workflow_id,
        deployment_id: query.deployment_id,
        limit: query.limit,
        offset: query.offset,
    };

    match state.store.list(&organization_id, filter).await {
        Ok(records) => Ok(Json(records)),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Live per-level progress for one execution. Only
/// snapshots for the requested `execution_id` are forwarded; every other
/// in-flight execution's broadcast is filtered out client-side of the
/// channel rather than by a dedicated per-execution subscription, since the
/// monitor multiplexes all executions over one channel.
pub async fn stream(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.monitor.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(move |snapshot| match snapshot {
        Ok(snapshot) if snapshot.execution_id == id => {
            let payload = serde_json::to_string(&snapshot).unwrap_or_default();
            Some(Ok(Event::default().data(payload)))
        }
        Ok(_) => None,
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
