pub mod analyses;
pub mod analyze;
pub mod health;
pub mod jobs;
pub mod schemas;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use voxguard_audit::AuditStore;

use crate::admission::AdmissionService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The canonical admission contract.
    pub admission: Arc<AdmissionService>,
    /// Audit sink, when enabled, for the read-side listing.
    pub audit: Option<Arc<dyn AuditStore>>,
    /// Name of the state backend, reported by `/health`.
    pub backend: &'static str,
    /// Upload cap, mirrored into the HTTP body limit.
    pub max_upload_bytes: usize,
}

/// Build the Axum router with all API routes and middleware.
pub fn router(state: AppState) -> Router {
    // Leave headroom above the upload cap for multipart framing; admission
    // still enforces the exact byte limit.
    let body_limit = state.max_upload_bytes + 64 * 1024;

    Router::new()
        .route("/health", get(health::health))
        .route("/v1/analyze", post(analyze::analyze))
        .route("/v1/jobs/{id}", get(jobs::job_status))
        .route("/v1/analyses", get(analyses::recent))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
