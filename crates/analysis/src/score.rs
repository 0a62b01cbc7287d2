//! Deterministic risk scoring.
//!
//! A pure function from a [`FeatureVector`] to scores, flags, and a summary.
//! Every raw feature maps to a `[0, 1]` sub-score through a fixed
//! scale-and-clamp; composites are weighted blends squashed by a saturating
//! sigmoid. Identical inputs produce bit-identical outputs.

use crate::features::FeatureVector;

/// At most this many flags are attached to a result.
const MAX_FLAGS: usize = 4;

/// Flag thresholds, in evaluation order.
const AI_FLAG_THRESHOLD: f64 = 75.0;
const STRESS_FLAG_THRESHOLD: f64 = 70.0;
const COMPRESSION_FLAG_THRESHOLD: f64 = 0.72;
const SHORT_SAMPLE_THRESHOLD_S: f64 = 2.0;

/// Summary tier cutoffs on `scam_score`.
const HIGH_RISK_CUTOFF: f64 = 75.0;
const MODERATE_RISK_CUTOFF: f64 = 45.0;

pub const FLAG_SYNTHETIC_VOICE: &str = "Synthetic voice characteristics (prototype)";
pub const FLAG_VOCAL_STRESS: &str = "High vocal stress detected (prototype)";
pub const FLAG_COMPRESSION: &str = "High compression / telephony-like signal (prototype)";
pub const FLAG_SHORT_SAMPLE: &str = "Very short sample (lower confidence)";

pub const SUMMARY_HIGH: &str =
    "High-risk pattern detected (prototype). Verify identity via official channels.";
pub const SUMMARY_MODERATE: &str =
    "Moderate risk indicators detected (prototype). Stay cautious and verify the caller.";
pub const SUMMARY_LOW: &str =
    "Low risk indicators in this sample (prototype), but remain cautious.";

/// Output of the score engine; the caller attaches decode provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    pub ai_voice_prob: f64,
    pub stress_level: f64,
    pub scam_score: f64,
    pub flags: Vec<String>,
    pub summary: String,
}

/// Score one feature vector.
#[must_use]
pub fn score(features: &FeatureVector) -> Scores {
    // Sub-scores in [0, 1]. The smoothness family inverts: low jitter and
    // low variability read as synthetic.
    let smoothness = 1.0 - clamp100(features.jitter * 220.0) / 100.0;
    let cepstral_stability = 1.0 - clamp100(features.mfcc_std_mean * 18.0) / 100.0;
    let pitch_stability = 1.0 - clamp100(features.f0_std * 0.45) / 100.0;
    let flatness_sub = clamp100(features.flatness_mean * 140.0) / 100.0;

    let zcr_sub = clamp100(features.zcr_mean * 1300.0) / 100.0;
    let rms_var_sub = clamp100(features.rms_var * 85.0) / 100.0;
    let centroid_sub = clamp100(features.centroid_mean / 5000.0 * 100.0) / 100.0;

    let compression_hint = clamp100(
        (features.rolloff_mean / 8000.0 - features.centroid_mean / 5000.0) * 140.0 + 50.0,
    ) / 100.0;

    let ai_raw = 0.36 * smoothness
        + 0.26 * cepstral_stability
        + 0.22 * pitch_stability
        + 0.16 * flatness_sub;
    let ai_voice_prob = 100.0 * sigmoid01((ai_raw - 0.52) * 6.0);

    let stress_raw = 0.48 * zcr_sub + 0.32 * rms_var_sub + 0.20 * centroid_sub;
    let stress_level = 100.0 * sigmoid01((stress_raw - 0.40) * 6.0);

    let scam_raw = 0.62 * (ai_voice_prob / 100.0)
        + 0.28 * (stress_level / 100.0)
        + 0.10 * compression_hint;
    let scam_score = 100.0 * sigmoid01((scam_raw - 0.48) * 7.0);

    // Flags in fixed evaluation order.
    let mut flags = Vec::new();
    if ai_voice_prob >= AI_FLAG_THRESHOLD {
        flags.push(FLAG_SYNTHETIC_VOICE.to_owned());
    }
    if stress_level >= STRESS_FLAG_THRESHOLD {
        flags.push(FLAG_VOCAL_STRESS.to_owned());
    }
    if compression_hint >= COMPRESSION_FLAG_THRESHOLD {
        flags.push(FLAG_COMPRESSION.to_owned());
    }
    if features.duration_s < SHORT_SAMPLE_THRESHOLD_S {
        flags.push(FLAG_SHORT_SAMPLE.to_owned());
    }
    flags.truncate(MAX_FLAGS);

    let summary = if scam_score >= HIGH_RISK_CUTOFF {
        SUMMARY_HIGH
    } else if scam_score >= MODERATE_RISK_CUTOFF {
        SUMMARY_MODERATE
    } else {
        SUMMARY_LOW
    };

    Scores {
        ai_voice_prob: round1(clamp100(ai_voice_prob)),
        stress_level: round1(clamp100(stress_level)),
        scam_score: round1(clamp100(scam_score)),
        flags,
        summary: summary.to_owned(),
    }
}

/// Clamp into [0, 100]; non-finite input collapses to 0.
fn clamp100(x: f64) -> f64 {
    if x.is_finite() { x.clamp(0.0, 100.0) } else { 0.0 }
}

/// Logistic squashing that saturates to exactly 0.0 / 1.0 beyond ±35 so the
/// exponential can never overflow.
fn sigmoid01(x: f64) -> f64 {
    if x >= 35.0 {
        1.0
    } else if x <= -35.0 {
        0.0
    } else {
        1.0 / (1.0 + (-x).exp())
    }
}

/// Round to one decimal place.
fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
