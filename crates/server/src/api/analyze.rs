use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Multipart, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::debug;

use crate::admission::AdmissionError;

use super::schemas::{AdmitResponse, ErrorResponse};
use super::AppState;

/// Client address for rate limiting and provenance.
///
/// Prefers the proxy-provided `x-forwarded-for` address and falls back to
/// the socket peer when the server was started with connect info. Absent
/// both, admission buckets the request as anonymous.
pub struct ClientIp(pub Option<String>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(forwarded) = parts.headers.get("x-forwarded-for")
            && let Ok(value) = forwarded.to_str()
            && let Some(first) = value.split(',').next()
        {
            let first = first.trim();
            if !first.is_empty() {
                return Ok(Self(Some(first.to_owned())));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(peer))
    }
}

/// `POST /v1/analyze` -- accept a multipart upload and queue it for
/// asynchronous analysis.
///
/// Expects a `file` part. Returns `202 Accepted` with the job id; the
/// result is picked up later via `GET /v1/jobs/{id}`.
pub async fn analyze(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut upload: Option<(Option<String>, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("file") {
                    let filename = field.file_name().map(ToOwned::to_owned);
                    match field.bytes().await {
                        Ok(bytes) => {
                            upload = Some((filename, bytes.to_vec()));
                            break;
                        }
                        Err(e) => {
                            debug!(error = %e, "multipart body read failed");
                            return error_response(
                                StatusCode::BAD_REQUEST,
                                "unreadable multipart body",
                            );
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "multipart parse failed");
                return error_response(StatusCode::BAD_REQUEST, "malformed multipart request");
            }
        }
    }

    let Some((filename, bytes)) = upload else {
        return admission_error_response(&AdmissionError::MissingFile);
    };

    match state.admission.admit(ip, filename, &bytes).await {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!(AdmitResponse {
                job_id: job.id.to_string(),
                status: job.status.as_str().to_owned(),
            })),
        ),
        Err(e) => admission_error_response(&e),
    }
}

fn admission_error_response(error: &AdmissionError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match error {
        AdmissionError::MissingFile | AdmissionError::EmptyFile => StatusCode::BAD_REQUEST,
        AdmissionError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        AdmissionError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        AdmissionError::State(_) | AdmissionError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, &error.to_string())
}

fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(serde_json::json!(ErrorResponse {
            error: message.to_owned(),
        })),
    )
}
