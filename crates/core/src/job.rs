use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::result::AnalysisResult;
use crate::types::JobId;

/// Failure messages stored on a job record are truncated to this length.
pub const ERROR_MESSAGE_MAX_CHARS: usize = 200;

/// Lifecycle status of an analysis job.
///
/// Transitions are strictly monotonic: `queued -> processing -> {done, failed}`.
/// `done` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    /// Whether this status admits no further transitions.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Stable lowercase name, matching the serialized form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Rejected job status transition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid job transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// The stored record for one analysis job.
///
/// Owned by the job store; the worker holds it only for the duration of a
/// single job's processing. Provenance fields (`ip`, `filename`, `bytes`)
/// are set at admission and never change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms: Option<u64>,
}

impl JobRecord {
    /// Create a freshly admitted record in the `queued` state.
    #[must_use]
    pub fn admitted(
        id: JobId,
        ip: Option<String>,
        filename: Option<String>,
        bytes: u64,
    ) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            ip,
            filename,
            bytes: Some(bytes),
            result: None,
            error: None,
            ms: None,
        }
    }

    /// Re-seed a minimal record for a popped id whose stored record is
    /// missing or unreadable. The worker still drives it to a terminal state
    /// so the caller can observe the outcome.
    #[must_use]
    pub fn reseeded(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            ip: None,
            filename: None,
            bytes: None,
            result: None,
            error: None,
            ms: None,
        }
    }

    /// Enter `processing`. Allowed only from `queued`; stamps `started_at`
    /// exactly once.
    pub fn begin_processing(&mut self) -> Result<(), InvalidTransition> {
        if self.status != JobStatus::Queued {
            return Err(InvalidTransition {
                from: self.status,
                to: JobStatus::Processing,
            });
        }
        self.status = JobStatus::Processing;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Terminal success. Allowed only from `processing`.
    pub fn complete(
        &mut self,
        result: AnalysisResult,
        elapsed_ms: u64,
    ) -> Result<(), InvalidTransition> {
        if self.status != JobStatus::Processing {
            return Err(InvalidTransition {
                from: self.status,
                to: JobStatus::Done,
            });
        }
        self.status = JobStatus::Done;
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        self.result = Some(result);
        self.ms = Some(elapsed_ms);
        Ok(())
    }

    /// Terminal failure. Allowed only from `processing`; the message is
    /// truncated so stack traces or tool output never reach callers.
    pub fn fail(
        &mut self,
        message: impl AsRef<str>,
        elapsed_ms: u64,
    ) -> Result<(), InvalidTransition> {
        if self.status != JobStatus::Processing {
            return Err(InvalidTransition {
                from: self.status,
                to: JobStatus::Failed,
            });
        }
        self.status = JobStatus::Failed;
        if self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        self.error = Some(truncate_chars(message.as_ref(), ERROR_MESSAGE_MAX_CHARS));
        self.ms = Some(elapsed_ms);
        Ok(())
    }
}

/// Truncate to at most `max` chars on a char boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        s.chars().take(max).collect()
    }
}
