use serde::{Deserialize, Serialize};

/// Uniform error body for every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body returned by a successful admission.
#[derive(Debug, Serialize, Deserialize)]
pub struct AdmitResponse {
    pub job_id: String,
    pub status: String,
}

/// Body returned by `/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub backend: String,
}

/// Query parameters for the audit listing.
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}
