use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use super::schemas::{ErrorResponse, RecentQuery};
use super::AppState;

/// `GET /v1/analyses?limit=N` -- recent audit rows, newest first.
///
/// Served only when the audit trail is enabled.
pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> impl IntoResponse {
    let Some(ref audit) = state.audit else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!(ErrorResponse {
                error: "audit trail is disabled".to_owned(),
            })),
        );
    };

    match audit.recent(query.limit.unwrap_or(50)).await {
        Ok(rows) => (StatusCode::OK, Json(serde_json::json!(rows))),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!(ErrorResponse {
                error: e.to_string(),
            })),
        ),
    }
}
