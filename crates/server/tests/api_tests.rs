use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use tower::ServiceExt;

use voxguard_analysis::{Analyzer, LoaderConfig};
use voxguard_audit::AuditStore;
use voxguard_audit_memory::MemoryAuditStore;
use voxguard_server::admission::{AdmissionConfig, AdmissionService};
use voxguard_server::api::{router, AppState};
use voxguard_server::config::RateLimitConfig;
use voxguard_server::ratelimit::RateLimiter;
use voxguard_state::{JobQueue, StateStore};
use voxguard_state_memory::{MemoryJobQueue, MemoryStateStore};
use voxguard_worker::{Worker, WorkerConfig};

// -- Helpers --------------------------------------------------------------

struct TestStack {
    app: axum::Router,
    state: Arc<MemoryStateStore>,
    queue: Arc<MemoryJobQueue>,
    audit: Option<Arc<MemoryAuditStore>>,
}

fn build_stack(rate_limit: Option<RateLimitConfig>, with_audit: bool) -> TestStack {
    let state = Arc::new(MemoryStateStore::new());
    let queue = Arc::new(MemoryJobQueue::new());
    let audit = with_audit.then(|| Arc::new(MemoryAuditStore::new()));

    let limiter = rate_limit.map(|config| {
        RateLimiter::new(Arc::clone(&state) as Arc<dyn StateStore>, config)
    });

    let admission = AdmissionService::new(
        Arc::clone(&state) as Arc<dyn StateStore>,
        Arc::clone(&queue) as Arc<dyn JobQueue>,
        limiter,
        AdmissionConfig::default(),
    );

    let app = router(AppState {
        admission: Arc::new(admission),
        audit: audit
            .as_ref()
            .map(|a| Arc::clone(a) as Arc<dyn AuditStore>),
        backend: "memory",
        max_upload_bytes: 10 * 1024 * 1024,
    });

    TestStack {
        app,
        state,
        queue,
        audit,
    }
}

/// Mono 16-bit WAV bytes with a 220 Hz tone.
fn wav_fixture(seconds: f64) -> Vec<u8> {
    let sample_rate = 16_000u32;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let n = (f64::from(sample_rate) * seconds) as usize;
        for i in 0..n {
            let t = i as f64 / f64::from(sample_rate);
            #[allow(clippy::cast_possible_truncation)]
            let s = ((t * 220.0 * std::f64::consts::TAU).sin() * 12000.0) as i16;
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

const BOUNDARY: &str = "voxguard-test-boundary";

fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn analyze_request(field: &str, filename: &str, bytes: &[u8], ip: &str) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .uri("/v1/analyze")
        .header(
            http::header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("x-forwarded-for", ip)
        .body(Body::from(multipart_body(field, filename, bytes)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

// -- Tests ----------------------------------------------------------------

#[tokio::test]
async fn health_reports_backend() {
    let stack = build_stack(None, false);

    let response = stack
        .app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["backend"], "memory");
}

#[tokio::test]
async fn analyze_admits_and_status_round_trips() {
    let stack = build_stack(None, false);

    let response = stack
        .app
        .clone()
        .oneshot(analyze_request("file", "call.wav", &wav_fixture(1.0), "10.9.8.7"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = json_body(response).await;
    assert_eq!(json["status"], "queued");
    let job_id = json["job_id"].as_str().unwrap().to_owned();
    assert!(job_id.starts_with("job_"));

    // Status query immediately after admission returns the queued record.
    let response = stack
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/jobs/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "queued");
    assert_eq!(json["filename"], "call.wav");
    assert_eq!(json["ip"], "10.9.8.7");
}

#[tokio::test]
async fn missing_file_part_is_rejected() {
    let stack = build_stack(None, false);

    let response = stack
        .app
        .oneshot(analyze_request("not_file", "x.wav", b"data", "10.0.0.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_file_is_rejected() {
    let stack = build_stack(None, false);

    let response = stack
        .app
        .oneshot(analyze_request("file", "empty.wav", b"", "10.0.0.1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "empty file");
}

#[tokio::test]
async fn fourth_request_in_window_gets_429() {
    let stack = build_stack(
        Some(RateLimitConfig {
            max_requests: 3,
            // Long window so the test cannot straddle a boundary.
            window_seconds: 3600,
            ..RateLimitConfig::default()
        }),
        false,
    );

    for i in 0..3 {
        let response = stack
            .app
            .clone()
            .oneshot(analyze_request("file", "a.wav", b"data", "10.2.2.2"))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::ACCEPTED,
            "request {} should be admitted",
            i + 1
        );
    }

    let response = stack
        .app
        .oneshot(analyze_request("file", "a.wav", b"data", "10.2.2.2"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn unknown_job_is_404() {
    let stack = build_stack(None, false);

    let response = stack
        .app
        .oneshot(
            Request::builder()
                .uri("/v1/jobs/job_nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analyses_listing_requires_audit() {
    let stack = build_stack(None, false);

    let response = stack
        .app
        .oneshot(
            Request::builder()
                .uri("/v1/analyses")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admitted_job_is_processed_to_done() {
    let stack = build_stack(None, true);

    let response = stack
        .app
        .clone()
        .oneshot(analyze_request("file", "tone.wav", &wav_fixture(1.0), "10.3.3.3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = json_body(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_owned();

    // Run one worker poll against the same backends.
    let worker = Worker::new(
        Arc::clone(&stack.state) as Arc<dyn StateStore>,
        Arc::clone(&stack.queue) as Arc<dyn JobQueue>,
        stack
            .audit
            .as_ref()
            .map(|a| Arc::clone(a) as Arc<dyn AuditStore>),
        Analyzer::new(LoaderConfig::default()),
        WorkerConfig {
            pop_timeout: Duration::from_millis(100),
            job_ttl: Duration::from_secs(60),
        },
    );
    assert!(worker.poll_once().await);

    let response = stack
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/jobs/{job_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "done");
    assert_eq!(json["result"]["voice_match"], "Unknown");
    assert!(json["result"]["scam_score"].is_number());
    assert_eq!(json["result"]["meta"]["loader"], "wav");

    // The audit row shows up in the listing.
    let response = stack
        .app
        .oneshot(
            Request::builder()
                .uri("/v1/analyses?limit=5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["id"], job_id);
}
