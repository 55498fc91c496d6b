use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use db::repository::workflows as wf_repo;
use engine::{RuntimeParams, Trigger, Workflow};

use super::AppState;
use crate::inject_request_input;

/// Finds the workflow whose trigger is `Trigger::Http { path }` matching the
/// request path and enqueues a run for it — the webhook body becomes the
/// entry node's inputs, same as an interactive `execute` call.
pub async fn handle_webhook(
    Path(path): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    // Webhooks carry no organization header, so every workflow definition
    // across all tenants is scanned for a matching trigger path.
    let rows = wf_repo::list_all_workflows(&state.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let matched = rows.into_iter().find_map(|row| {
        let workflow: Workflow = serde_json::from_value(row.definition.clone()).ok()?;
        match &workflow.trigger {
            Trigger::Http { path: trigger_path } if trigger_path == &path => Some((row, workflow)),
            _ => None,
        }
    });

    let Some((row, mut workflow)) = matched else {
        return Err(StatusCode::NOT_FOUND);
    };

    inject_request_input(&mut workflow, &payload, state.object_store.as_ref())
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let execution_id = Uuid::new_v4();
    let params = RuntimeParams {
        workflow,
        user_id: "webhook".to_string(),
        organization_id: row.organization_id,
        compute_credits: row.compute_credits.max(0) as u64,
        subscription_status: row.subscription_status,
        overage_limit: row.overage_limit.map(|v| v.max(0) as u64),
        deployment_id: None,
        monitor_progress: false,
        dev_mode: false,
        env: Value::Null,
    };

    state
        .queue
        .enqueue(execution_id, &params)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "execution_id": execution_id })),
    ))
}
