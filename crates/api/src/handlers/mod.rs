pub mod executions;
pub mod webhooks;
pub mod workflows;

use axum::http::StatusCode;

/// `organization_id` has no dedicated auth layer yet, so it's taken as a
/// plain header rather than invented into request bodies that otherwise
/// only carry the operation's own payload.
pub(crate) fn organization_header(headers: &axum::http::HeaderMap) -> Result<String, StatusCode> {
    headers
        .get("x-organization-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or(StatusCode::BAD_REQUEST)
}
