use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summaries longer than this are truncated before persisting.
pub const SUMMARY_MAX_CHARS: usize = 2000;

/// One row of the write-behind audit log: a single completed analysis.
///
/// Mirrors the `analyses` table; `flags` and `meta` are stored as
/// structured JSON columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRow {
    /// Job id of the analysis.
    pub id: String,
    /// When the row was recorded.
    pub created_at: DateTime<Utc>,
    /// Client address captured at admission.
    pub ip: Option<String>,
    /// Uploaded filename captured at admission.
    pub filename: Option<String>,
    /// Uploaded payload size in bytes.
    pub bytes: Option<i64>,
    /// Composite scam-risk score.
    pub scam_score: f64,
    /// Synthetic-voice likelihood.
    pub ai_voice_prob: f64,
    /// Vocal-stress level.
    pub stress_level: f64,
    /// Risk-tier summary, truncated to [`SUMMARY_MAX_CHARS`].
    pub summary: String,
    /// Advisory flags as a JSON array.
    pub flags: serde_json::Value,
    /// Decode provenance as a JSON object.
    pub meta: serde_json::Value,
}

impl AnalysisRow {
    /// Apply the summary length bound. Called by backends before writing.
    #[must_use]
    pub fn bounded_summary(&self) -> &str {
        match self
            .summary
            .char_indices()
            .nth(SUMMARY_MAX_CHARS)
            .map(|(idx, _)| idx)
        {
            Some(idx) => &self.summary[..idx],
            None => &self.summary,
        }
    }
}
