use serde::{Deserialize, Serialize};

/// Constant placeholder: voice-biometric matching is out of scope.
pub const VOICE_MATCH_UNKNOWN: &str = "Unknown";

/// Immutable outcome of a completed analysis.
///
/// All three scores are percentages in `[0, 100]` rounded to one decimal
/// place. `flags` preserves the evaluation order of the conditions that
/// triggered them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// One of three fixed risk-tier strings chosen by `scam_score`.
    pub summary: String,
    /// Composite scam-risk score.
    pub scam_score: f64,
    /// Synthetic-voice likelihood.
    pub ai_voice_prob: f64,
    /// Vocal-stress level.
    pub stress_level: f64,
    /// Ordered advisory flags, capped length.
    pub flags: Vec<String>,
    /// Always `"Unknown"`; biometric matching is not performed.
    pub voice_match: String,
    /// Provenance of the decoded sample.
    pub meta: ResultMeta,
}

/// Decode provenance attached to every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMeta {
    /// Service version that produced the result.
    pub version: String,
    /// Decoded duration in seconds, rounded to milliseconds.
    pub duration_s: f64,
    /// Sample rate of the analyzed waveform.
    pub sr: u32,
    /// Which decode stage succeeded (`"wav"` or `"ffmpeg"`).
    pub loader: String,
}
