use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use super::schemas::ErrorResponse;
use super::AppState;

/// `GET /v1/jobs/{id}` -- the stored job record, verbatim.
///
/// A job whose TTL elapsed is indistinguishable from one that never
/// existed; both are a 404.
pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.admission.job_status(&id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(serde_json::json!(job))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!(ErrorResponse {
                error: "job not found or expired".to_owned(),
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!(ErrorResponse {
                error: e.to_string(),
            })),
        ),
    }
}
