//! Audio decode, feature extraction, and risk scoring.
//!
//! The three stages are deliberately separate: [`loader`] turns uploaded
//! bytes into a normalized mono waveform (with an ffmpeg transcode
//! fallback), [`features`] reduces the waveform to a fixed set of acoustic
//! descriptors, and [`score`] maps those descriptors to scores, flags, and a
//! summary through a fixed formula. Scoring is a pure function so the whole
//! pipeline is deterministic for a given decoded waveform.

pub mod error;
pub mod features;
pub mod loader;
pub mod score;

use voxguard_core::{AnalysisResult, ResultMeta, SERVICE_VERSION};

pub use error::AnalysisError;
pub use features::FeatureVector;
pub use loader::{AudioLoader, LoadedAudio, LoaderConfig};

/// End-to-end analysis of one uploaded sample.
///
/// Shared by every worker instance; holds only configuration.
#[derive(Debug, Clone)]
pub struct Analyzer {
    loader: AudioLoader,
}

impl Analyzer {
    /// Create an analyzer with the given loader configuration.
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            loader: AudioLoader::new(config),
        }
    }

    /// Decode, extract, and score one sample.
    pub async fn analyze(&self, bytes: &[u8]) -> Result<AnalysisResult, AnalysisError> {
        let audio = self.loader.load(bytes).await?;
        let features = features::extract(&audio.samples, audio.sample_rate, audio.duration_s);
        let scores = score::score(&features);

        Ok(AnalysisResult {
            summary: scores.summary,
            scam_score: scores.scam_score,
            ai_voice_prob: scores.ai_voice_prob,
            stress_level: scores.stress_level,
            flags: scores.flags,
            voice_match: voxguard_core::result::VOICE_MATCH_UNKNOWN.to_owned(),
            meta: ResultMeta {
                version: SERVICE_VERSION.to_owned(),
                duration_s: (audio.duration_s * 1000.0).round() / 1000.0,
                sr: audio.sample_rate,
                loader: audio.loader.to_owned(),
            },
        })
    }
}
