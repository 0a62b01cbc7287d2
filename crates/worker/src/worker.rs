use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use voxguard_analysis::Analyzer;
use voxguard_audit::{AnalysisRow, AuditStore};
use voxguard_core::{JobId, JobRecord};
use voxguard_state::{JobQueue, StateKey, StateStore};

/// Error kind recorded when the audio blob's TTL won the race against the
/// worker. This is the designed cross-clock failure mode: the job fails
/// predictably instead of hanging.
pub const AUDIO_MISSING_KIND: &str = "audio_missing_or_expired";

/// Pause after a queue error so a dead backend is not hot-polled.
const POP_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Worker loop settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Bound on each blocking pop; the loop wakes at least this often.
    pub pop_timeout: Duration,
    /// TTL re-applied to the job record on every status write.
    pub job_ttl: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pop_timeout: Duration::from_secs(30),
            job_ttl: Duration::from_secs(3600),
        }
    }
}

/// One worker instance: queue in, terminal job status out.
pub struct Worker {
    state: Arc<dyn StateStore>,
    queue: Arc<dyn JobQueue>,
    audit: Option<Arc<dyn AuditStore>>,
    analyzer: Analyzer,
    config: WorkerConfig,
}

impl Worker {
    /// Assemble a worker over already-constructed backends.
    #[must_use]
    pub fn new(
        state: Arc<dyn StateStore>,
        queue: Arc<dyn JobQueue>,
        audit: Option<Arc<dyn AuditStore>>,
        analyzer: Analyzer,
        config: WorkerConfig,
    ) -> Self {
        Self {
            state,
            queue,
            audit,
            analyzer,
            config,
        }
    }

    /// Poll-and-process until the shutdown signal flips to `true`.
    ///
    /// Only the queue wait races with shutdown; once a job is popped it runs
    /// to a terminal state before the signal is checked again.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let popped = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                popped = self.queue.pop_blocking(self.config.pop_timeout) => popped,
            };

            match popped {
                Ok(Some(job_id)) => self.process_job(&job_id).await,
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "queue pop failed");
                    tokio::time::sleep(POP_ERROR_BACKOFF).await;
                }
            }
        }
        info!("worker stopped");
    }

    /// One poll step: pop with the configured timeout and process if an id
    /// arrived. Returns whether a job was processed. Used directly by tests
    /// and by single-shot maintenance runs.
    pub async fn poll_once(&self) -> bool {
        match self.queue.pop_blocking(self.config.pop_timeout).await {
            Ok(Some(job_id)) => {
                self.process_job(&job_id).await;
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "queue pop failed");
                false
            }
        }
    }

    /// Drive one popped job to a terminal state.
    ///
    /// Never panics and never returns an error — any failure lands on the
    /// job record, and the audio blob is deleted exactly once on the way
    /// out whatever happened before.
    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn process_job(&self, job_id: &str) {
        let started = Instant::now();

        let mut job = self.fetch_or_reseed(job_id).await;
        // Entering `processing` before any decode work makes a stuck worker
        // observable as a job stuck in `processing`.
        if let Err(e) = job.begin_processing() {
            warn!(error = %e, "refusing to reprocess a non-queued job");
            return;
        }
        self.write_job(&job).await;

        let audio_key = StateKey::audio(job_id);
        let blob = match self.state.get(&audio_key).await {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "audio store read failed");
                None
            }
        };

        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = || started.elapsed().as_millis() as u64;

        match blob {
            None => {
                debug!("audio blob missing or expired");
                if let Err(e) = job.fail(AUDIO_MISSING_KIND, elapsed_ms()) {
                    warn!(error = %e, "could not record blob-expiry failure");
                }
            }
            Some(bytes) => match self.analyzer.analyze(&bytes).await {
                Ok(result) => {
                    self.record_audit(&job, &bytes, &result).await;
                    if let Err(e) = job.complete(result, elapsed_ms()) {
                        warn!(error = %e, "could not record completion");
                    }
                }
                Err(e) => {
                    debug!(kind = e.kind(), "analysis failed");
                    if let Err(te) = job.fail(e.to_string(), elapsed_ms()) {
                        warn!(error = %te, "could not record analysis failure");
                    }
                }
            },
        }

        self.write_job(&job).await;

        // Guaranteed cleanup: the blob is deleted exactly once regardless of
        // outcome, even if the terminal write above failed.
        if let Err(e) = self.state.delete(&audio_key).await {
            warn!(error = %e, "audio blob delete failed");
        }

        info!(status = job.status.as_str(), ms = job.ms, "job finished");
    }

    /// Load the stored record, or re-seed a minimal one so the job still
    /// reaches a terminal state a caller can observe.
    async fn fetch_or_reseed(&self, job_id: &str) -> JobRecord {
        let key = StateKey::job(job_id);
        match self.state.get(&key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(job) => job,
                Err(e) => {
                    warn!(error = %e, "stored job record unreadable, re-seeding");
                    JobRecord::reseeded(JobId::new(job_id))
                }
            },
            Ok(None) => {
                warn!("no stored record for popped id, re-seeding");
                JobRecord::reseeded(JobId::new(job_id))
            }
            Err(e) => {
                warn!(error = %e, "job store read failed, re-seeding");
                JobRecord::reseeded(JobId::new(job_id))
            }
        }
    }

    /// Persist the record with a refreshed job TTL. Store errors are logged;
    /// the pipeline keeps going so cleanup still happens.
    async fn write_job(&self, job: &JobRecord) {
        let key = StateKey::job(job.id.as_str());
        match serde_json::to_vec(job) {
            Ok(bytes) => {
                if let Err(e) = self
                    .state
                    .put(&key, &bytes, Some(self.config.job_ttl))
                    .await
                {
                    warn!(error = %e, "job record write failed");
                }
            }
            Err(e) => warn!(error = %e, "job record serialization failed"),
        }
    }

    /// Best-effort audit write. Failures are logged and swallowed; they
    /// never change job status and never block cleanup.
    async fn record_audit(
        &self,
        job: &JobRecord,
        blob: &[u8],
        result: &voxguard_core::AnalysisResult,
    ) {
        let Some(ref audit) = self.audit else {
            return;
        };

        let row = AnalysisRow {
            id: job.id.as_str().to_owned(),
            created_at: Utc::now(),
            ip: job.ip.clone(),
            filename: job.filename.clone(),
            bytes: i64::try_from(blob.len()).ok(),
            scam_score: result.scam_score,
            ai_voice_prob: result.ai_voice_prob,
            stress_level: result.stress_level,
            summary: result.summary.clone(),
            flags: serde_json::json!(result.flags),
            meta: serde_json::json!({
                "version": result.meta.version,
                "duration_s": result.meta.duration_s,
                "sr": result.meta.sr,
                "loader": result.meta.loader,
            }),
        };

        if let Err(e) = audit.record(row).await {
            warn!(error = %e, "audit write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use async_trait::async_trait;

    use voxguard_analysis::LoaderConfig;
    use voxguard_audit::error::AuditError;
    use voxguard_audit_memory::MemoryAuditStore;
    use voxguard_core::JobStatus;
    use voxguard_state_memory::{MemoryJobQueue, MemoryStateStore};

    use super::*;

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

    struct Harness {
        state: Arc<MemoryStateStore>,
        queue: Arc<MemoryJobQueue>,
        audit: Arc<MemoryAuditStore>,
        worker: Worker,
    }

    fn harness() -> Harness {
        let state = Arc::new(MemoryStateStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let audit = Arc::new(MemoryAuditStore::new());
        let worker = Worker::new(
            Arc::clone(&state) as Arc<dyn StateStore>,
            Arc::clone(&queue) as Arc<dyn JobQueue>,
            Some(Arc::clone(&audit) as Arc<dyn AuditStore>),
            Analyzer::new(LoaderConfig::default()),
            WorkerConfig {
                pop_timeout: Duration::from_millis(50),
                job_ttl: Duration::from_secs(60),
            },
        );
        Harness {
            state,
            queue,
            audit,
            worker,
        }
    }

    /// Admit a job the way the admission service does.
    async fn admit(h: &Harness, job_id: &str, blob: &[u8]) {
        let job = JobRecord::admitted(
            JobId::new(job_id),
            Some("10.1.2.3".to_owned()),
            Some("call.wav".to_owned()),
            blob.len() as u64,
        );
        h.state
            .put(&StateKey::audio(job_id), blob, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        h.state
            .put(
                &StateKey::job(job_id),
                &serde_json::to_vec(&job).unwrap(),
                Some(Duration::from_secs(120)),
            )
            .await
            .unwrap();
        h.queue.push(job_id).await.unwrap();
    }

    async fn stored_job(h: &Harness, job_id: &str) -> JobRecord {
        let bytes = h
            .state
            .get(&StateKey::job(job_id))
            .await
            .unwrap()
            .expect("job record present");
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn successful_job_reaches_done_and_cleans_up() {
        let h = harness();
        admit(&h, "job_ok", &wav_fixture(1.0)).await;

        assert!(h.worker.poll_once().await);

        let job = stored_job(&h, "job_ok").await;
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.started_at.is_some());
        assert!(job.finished_at.is_some());
        assert!(job.ms.is_some());

        let result = job.result.expect("result present on done job");
        assert_eq!(result.voice_match, "Unknown");
        assert_eq!(result.meta.loader, "wav");
        assert!((0.0..=100.0).contains(&result.scam_score));

        // Blob is gone after a successful run.
        let blob = h.state.get(&StateKey::audio("job_ok")).await.unwrap();
        assert!(blob.is_none(), "audio blob must be deleted");

        // Audit row landed.
        let rows = h.audit.recent(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "job_ok");
    }

    #[tokio::test]
    async fn expired_blob_fails_with_designed_kind() {
        let h = harness();
        // Record and queue entry exist, but no blob was ever stored —
        // indistinguishable from a blob whose TTL elapsed.
        let job = JobRecord::admitted(JobId::new("job_gone"), None, None, 10);
        h.state
            .put(
                &StateKey::job("job_gone"),
                &serde_json::to_vec(&job).unwrap(),
                None,
            )
            .await
            .unwrap();
        h.queue.push("job_gone").await.unwrap();

        assert!(h.worker.poll_once().await);

        let job = stored_job(&h, "job_gone").await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(AUDIO_MISSING_KIND));
        assert!(job.result.is_none(), "failed jobs carry no partial result");
    }

    #[tokio::test(start_paused = true)]
    async fn blob_ttl_elapsing_before_pop_fails_the_job() {
        let h = harness();
        // Admit normally, but the worker is delayed past the blob TTL.
        let blob = wav_fixture(1.0);
        let job = JobRecord::admitted(JobId::new("job_late"), None, None, blob.len() as u64);
        h.state
            .put(
                &StateKey::audio("job_late"),
                &blob,
                Some(Duration::from_secs(1)),
            )
            .await
            .unwrap();
        h.state
            .put(
                &StateKey::job("job_late"),
                &serde_json::to_vec(&job).unwrap(),
                Some(Duration::from_secs(3600)),
            )
            .await
            .unwrap();
        h.queue.push("job_late").await.unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;

        assert!(h.worker.poll_once().await);

        let job = stored_job(&h, "job_late").await;
        assert_eq!(job.status, JobStatus::Failed, "never done after blob expiry");
        assert_eq!(job.error.as_deref(), Some(AUDIO_MISSING_KIND));
    }

    #[tokio::test]
    async fn too_short_sample_fails_with_kind() {
        let h = harness();
        admit(&h, "job_short", &wav_fixture(0.3)).await;

        assert!(h.worker.poll_once().await);

        let job = stored_job(&h, "job_short").await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(
            job.error.as_deref().unwrap().starts_with("too_short_audio"),
            "got {:?}",
            job.error
        );

        // Cleanup happens on failure too.
        let blob = h.state.get(&StateKey::audio("job_short")).await.unwrap();
        assert!(blob.is_none());
    }

    #[tokio::test]
    async fn terminal_job_is_not_reprocessed() {
        let h = harness();
        admit(&h, "job_dup", &wav_fixture(1.0)).await;
        assert!(h.worker.poll_once().await);

        let first = stored_job(&h, "job_dup").await;
        assert_eq!(first.status, JobStatus::Done);

        // A stray duplicate of the id shows up later.
        h.queue.push("job_dup").await.unwrap();
        assert!(h.worker.poll_once().await);

        let second = stored_job(&h, "job_dup").await;
        assert_eq!(second.status, JobStatus::Done);
        assert_eq!(second.ms, first.ms, "terminal record must be untouched");
    }

    #[tokio::test]
    async fn popped_id_without_record_still_terminates() {
        let h = harness();
        h.state
            .put(
                &StateKey::audio("job_orphan"),
                &wav_fixture(1.0),
                Some(Duration::from_secs(60)),
            )
            .await
            .unwrap();
        h.queue.push("job_orphan").await.unwrap();

        assert!(h.worker.poll_once().await);

        let job = stored_job(&h, "job_orphan").await;
        assert_eq!(job.status, JobStatus::Done, "re-seeded job still completes");
    }

    struct FailingAuditStore;

    #[async_trait]
    impl AuditStore for FailingAuditStore {
        async fn record(&self, _row: AnalysisRow) -> Result<(), AuditError> {
            Err(AuditError::Backend("audit db down".into()))
        }

        async fn recent(&self, _limit: usize) -> Result<Vec<AnalysisRow>, AuditError> {
            Err(AuditError::Backend("audit db down".into()))
        }
    }

    #[tokio::test]
    async fn audit_failure_does_not_affect_job_status() {
        let state = Arc::new(MemoryStateStore::new());
        let queue = Arc::new(MemoryJobQueue::new());
        let worker = Worker::new(
            Arc::clone(&state) as Arc<dyn StateStore>,
            Arc::clone(&queue) as Arc<dyn JobQueue>,
            Some(Arc::new(FailingAuditStore)),
            Analyzer::new(LoaderConfig::default()),
            WorkerConfig {
                pop_timeout: Duration::from_millis(50),
                job_ttl: Duration::from_secs(60),
            },
        );

        let blob = wav_fixture(1.0);
        let job = JobRecord::admitted(JobId::new("job_audit"), None, None, blob.len() as u64);
        state
            .put(&StateKey::audio("job_audit"), &blob, None)
            .await
            .unwrap();
        state
            .put(
                &StateKey::job("job_audit"),
                &serde_json::to_vec(&job).unwrap(),
                None,
            )
            .await
            .unwrap();
        queue.push("job_audit").await.unwrap();

        assert!(worker.poll_once().await);

        let bytes = state
            .get(&StateKey::job("job_audit"))
            .await
            .unwrap()
            .unwrap();
        let job: JobRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(job.status, JobStatus::Done, "audit failure is swallowed");

        // Blob cleanup is not blocked either.
        assert!(state.get(&StateKey::audio("job_audit")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_queue_poll_returns_false() {
        let h = harness();
        assert!(!h.worker.poll_once().await);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_signal() {
        let h = harness();
        let (tx, rx) = watch::channel(false);

        let worker = h.worker;
        let handle = tokio::spawn(async move { worker.run(rx).await });

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker should stop promptly")
            .unwrap();
    }
}
