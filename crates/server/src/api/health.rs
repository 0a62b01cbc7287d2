use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use super::schemas::HealthResponse;
use super::AppState;

/// `GET /health` -- service liveness plus which state backend is active.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let body = HealthResponse {
        ok: true,
        backend: state.backend.to_owned(),
    };
    (StatusCode::OK, Json(body))
}
