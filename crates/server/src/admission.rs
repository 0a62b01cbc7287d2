use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use voxguard_core::{JobId, JobRecord};
use voxguard_state::{JobQueue, StateError, StateKey, StateStore};

use crate::ratelimit::{RateLimiter, ANONYMOUS_BUCKET};

/// Admission-time rejections. None of these issue a job id.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("no file provided")]
    MissingFile,

    #[error("empty file")]
    EmptyFile,

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("rate limit exceeded, retry in {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Lifetimes and limits applied at admission.
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// Uploads larger than this are rejected before a job is created.
    pub max_upload_bytes: usize,
    /// TTL on the stored job record.
    pub job_ttl: Duration,
    /// TTL on the stored audio blob; strictly shorter than the job TTL so
    /// blob expiry always leaves an observable failed job behind.
    pub audio_ttl: Duration,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            job_ttl: Duration::from_secs(3600),
            audio_ttl: Duration::from_secs(600),
        }
    }
}

/// The one canonical admission contract:
/// validate, rate-limit, store blob, store record, enqueue.
pub struct AdmissionService {
    state: Arc<dyn StateStore>,
    queue: Arc<dyn JobQueue>,
    limiter: Option<RateLimiter>,
    config: AdmissionConfig,
}

impl AdmissionService {
    /// Assemble the admission service over already-constructed backends.
    /// Pass `None` for `limiter` to disable rate limiting entirely.
    #[must_use]
    pub fn new(
        state: Arc<dyn StateStore>,
        queue: Arc<dyn JobQueue>,
        limiter: Option<RateLimiter>,
        config: AdmissionConfig,
    ) -> Self {
        Self {
            state,
            queue,
            limiter,
            config,
        }
    }

    /// Admit one uploaded sample.
    ///
    /// On success the caller gets back the freshly queued record; its id
    /// round-trips immediately through the job status endpoint.
    pub async fn admit(
        &self,
        ip: Option<String>,
        filename: Option<String>,
        bytes: &[u8],
    ) -> Result<JobRecord, AdmissionError> {
        if bytes.is_empty() {
            return Err(AdmissionError::EmptyFile);
        }
        if bytes.len() > self.config.max_upload_bytes {
            return Err(AdmissionError::PayloadTooLarge {
                size: bytes.len(),
                max: self.config.max_upload_bytes,
            });
        }

        if let Some(ref limiter) = self.limiter {
            let key = ip.as_deref().unwrap_or(ANONYMOUS_BUCKET);
            limiter
                .allow(key)
                .await
                .map_err(|e| AdmissionError::RateLimited {
                    retry_after: e.retry_after,
                })?;
        }

        let id = JobId::generate();

        self.state
            .put(
                &StateKey::audio(id.as_str()),
                bytes,
                Some(self.config.audio_ttl),
            )
            .await?;

        let job = JobRecord::admitted(
            id.clone(),
            ip,
            filename,
            u64::try_from(bytes.len()).unwrap_or(u64::MAX),
        );
        let encoded =
            serde_json::to_vec(&job).map_err(|e| AdmissionError::Serialization(e.to_string()))?;
        self.state
            .put(&StateKey::job(id.as_str()), &encoded, Some(self.config.job_ttl))
            .await?;

        self.queue.push(id.as_str()).await?;

        info!(job_id = %id, bytes = bytes.len(), "job admitted");
        Ok(job)
    }

    /// Fetch a job record verbatim; `None` covers both never-existed and
    /// TTL-expired.
    pub async fn job_status(&self, job_id: &str) -> Result<Option<JobRecord>, AdmissionError> {
        let Some(bytes) = self.state.get(&StateKey::job(job_id)).await? else {
            debug!(job_id = %job_id, "job not found or expired");
            return Ok(None);
        };
        let job = serde_json::from_slice(&bytes)
            .map_err(|e| AdmissionError::Serialization(e.to_string()))?;
        Ok(Some(job))
    }
}

#[cfg(test)]
mod tests {
    use voxguard_core::JobStatus;
    use voxguard_state_memory::{MemoryJobQueue, MemoryStateStore};

    use crate::config::RateLimitConfig;

    use super::*;

    fn service(limit: Option<u64>) -> (AdmissionService, Arc<MemoryJobQueue>) {
        let state: Arc<MemoryStateStore> = Arc::new(MemoryStateStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let limiter = limit.map(|max_requests| {
            RateLimiter::new(
                Arc::clone(&state) as Arc<dyn StateStore>,
                RateLimitConfig {
                    max_requests,
                    // Long window so the test cannot straddle a boundary.
                    window_seconds: 3600,
                    ..RateLimitConfig::default()
                },
            )
        });
        let service = AdmissionService::new(
            state,
            Arc::clone(&queue) as Arc<dyn JobQueue>,
            limiter,
            AdmissionConfig::default(),
        );
        (service, queue)
    }

    #[tokio::test]
    async fn admitted_job_round_trips_as_queued() {
        let (service, queue) = service(None);

        let job = service
            .admit(Some("10.0.0.9".to_owned()), Some("a.wav".to_owned()), b"data")
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.bytes, Some(4));

        let fetched = service.job_status(job.id.as_str()).await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Queued);
        assert_eq!(fetched.filename.as_deref(), Some("a.wav"));

        // The id landed on the queue exactly once.
        let popped = queue
            .pop_blocking(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(popped.as_deref(), Some(job.id.as_str()));
    }

    #[tokio::test]
    async fn admitted_ids_are_unique() {
        let (service, _queue) = service(None);
        let a = service.admit(None, None, b"one").await.unwrap();
        let b = service.admit(None, None, b"two").await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected_without_job() {
        let (service, queue) = service(None);
        let err = service.admit(None, None, b"").await.unwrap_err();
        assert!(matches!(err, AdmissionError::EmptyFile));
        assert!(queue.is_empty().await, "no job id may be issued");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_without_job() {
        let state: Arc<MemoryStateStore> = Arc::new(MemoryStateStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let service = AdmissionService::new(
            state,
            Arc::clone(&queue) as Arc<dyn JobQueue>,
            None,
            AdmissionConfig {
                max_upload_bytes: 8,
                ..AdmissionConfig::default()
            },
        );

        let err = service.admit(None, None, b"123456789").await.unwrap_err();
        assert!(matches!(err, AdmissionError::PayloadTooLarge { .. }));
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn fourth_request_in_window_is_rate_limited() {
        let (service, _queue) = service(Some(3));
        let ip = Some("10.0.0.7".to_owned());

        for _ in 0..3 {
            service.admit(ip.clone(), None, b"ok").await.unwrap();
        }
        let err = service.admit(ip, None, b"ok").await.unwrap_err();
        assert!(matches!(err, AdmissionError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn audio_blob_is_stored_under_the_job_id() {
        let (service, _queue) = service(None);
        let job = service.admit(None, None, b"blob-bytes").await.unwrap();

        // Reach through the same store the worker will use.
        let stored = service
            .state
            .get(&StateKey::audio(job.id.as_str()))
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some(&b"blob-bytes"[..]));
    }

    #[tokio::test]
    async fn unknown_job_status_is_none() {
        let (service, _queue) = service(None);
        assert!(service.job_status("job_missing").await.unwrap().is_none());
    }
}
