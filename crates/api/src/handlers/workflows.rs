use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use db::repository::workflows as wf_repo;
use engine::Workflow;

use super::{organization_header, AppState};

#[derive(serde::Deserialize)]
pub struct CreateWorkflowDto {
    pub name: String,
    pub definition: Value,
    #[serde(default)]
    pub compute_credits: i64,
    #[serde(default)]
    pub subscription_status: Option<String>,
    #[serde(default)]
    pub overage_limit: Option<i64>,
}

pub async fn list(
    headers: axum::http::HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<db::models::WorkflowRow>>, StatusCode> {
    let organization_id = organization_header(&headers)?;
    match wf_repo::list_workflows(&state.pool, &organization_id).await {
        Ok(workflows) => Ok(Json(workflows)),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<db::models::WorkflowRow>, StatusCode> {
    match wf_repo::get_workflow(&state.pool, id).await {
        Ok(wf) => Ok(Json(wf)),
        Err(db::DbError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub async fn create(
    headers: axum::http::HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkflowDto>,
) -> Result<(StatusCode, Json<db::models::WorkflowRow>), StatusCode> {
    let organization_id = organization_header(&headers)?;

    let mut workflow: Workflow =
        serde_json::from_value(payload.definition.clone()).map_err(|_| StatusCode::BAD_REQUEST)?;
    workflow.name = payload.name;

    let credits = wf_repo::CreditDefaults {
        compute_credits: payload.compute_credits,
        subscription_status: payload.subscription_status,
        overage_limit: payload.overage_limit,
    };

    match wf_repo::create_workflow(&state.pool, &organization_id, &workflow, credits).await {
        Ok(wf) => Ok((StatusCode::CREATED, Json(wf))),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, StatusCode> {
    match wf_repo::delete_workflow(&state.pool, id).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(db::DbError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
