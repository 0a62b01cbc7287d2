#![allow(clippy::cast_precision_loss)]

//! Acoustic descriptors for the score engine.
//!
//! Everything here is frame-based: 2048-sample frames with a 512-sample hop,
//! Hann-windowed magnitude spectra for the spectral shape features, raw
//! frames for energy and zero-crossing measures, and a YIN pitch track
//! restricted to the plausible human voice band. Reductions over empty or
//! non-finite data always yield 0.0 — NaN and Inf never leave this module.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

const FRAME_LEN: usize = 2048;
const HOP_LEN: usize = 512;
const N_MELS: usize = 40;
const N_MFCC: usize = 13;

/// Pitch extraction search band.
const F0_MIN_HZ: f64 = 70.0;
const F0_MAX_HZ: f64 = 400.0;
/// Estimates outside this band are discarded as outliers.
const F0_KEEP_LO_HZ: f64 = 50.0;
const F0_KEEP_HI_HZ: f64 = 500.0;
const YIN_THRESHOLD: f64 = 0.1;

const ROLLOFF_FRACTION: f64 = 0.85;
const LOG_EPS: f64 = 1e-10;

/// Fixed set of descriptors the score engine consumes.
///
/// Field order follows the extraction pipeline; all values are finite.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Decoded duration in seconds (pre-truncation).
    pub duration_s: f64,
    /// Mean frame RMS energy.
    pub rms_mean: f64,
    /// Std-dev of the frame RMS track.
    pub rms_var: f64,
    /// Mean zero-crossing rate.
    pub zcr_mean: f64,
    /// Mean spectral centroid in Hz.
    pub centroid_mean: f64,
    /// Mean spectral flatness in [0, 1].
    pub flatness_mean: f64,
    /// Mean 85%-energy rolloff frequency in Hz.
    pub rolloff_mean: f64,
    /// Per-coefficient std of the cepstral track, averaged.
    pub mfcc_std_mean: f64,
    /// Mean fundamental frequency of the filtered pitch track.
    pub f0_mean: f64,
    /// Std-dev of the filtered pitch track.
    pub f0_std: f64,
    /// Median absolute frame-to-frame pitch delta over mean pitch.
    pub jitter: f64,
}

/// Compute the full descriptor set for a normalized mono waveform.
#[must_use]
pub fn extract(samples: &[f32], sample_rate: u32, duration_s: f64) -> FeatureVector {
    let sr = f64::from(sample_rate);
    let signal: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();

    let starts = frame_starts(signal.len());
    let window = hann_window();
    let filterbank = mel_filterbank(sr);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(FRAME_LEN);
    let mut buffer = vec![Complex::new(0.0f64, 0.0); FRAME_LEN];

    let mut rms_track = Vec::with_capacity(starts.len());
    let mut zcr_track = Vec::with_capacity(starts.len());
    let mut centroid_track = Vec::new();
    let mut flatness_track = Vec::new();
    let mut rolloff_track = Vec::new();
    let mut mfcc_tracks: Vec<Vec<f64>> = vec![Vec::with_capacity(starts.len()); N_MFCC];

    for &start in &starts {
        let frame = padded_frame(&signal, start);

        rms_track.push(frame_rms(&frame));
        zcr_track.push(frame_zcr(&frame));

        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(frame[i] * window[i], 0.0);
        }
        fft.process(&mut buffer);

        let bins = FRAME_LEN / 2 + 1;
        let magnitudes: Vec<f64> = buffer[..bins].iter().map(|c| c.norm()).collect();

        if let Some(centroid) = spectral_centroid(&magnitudes, sr) {
            centroid_track.push(centroid);
        }
        flatness_track.push(spectral_flatness(&magnitudes));
        if let Some(rolloff) = spectral_rolloff(&magnitudes, sr) {
            rolloff_track.push(rolloff);
        }

        let coeffs = mfcc(&magnitudes, &filterbank);
        for (track, value) in mfcc_tracks.iter_mut().zip(coeffs) {
            track.push(value);
        }
    }

    let mfcc_stds: Vec<f64> = mfcc_tracks.iter().map(|track| safe_std(track)).collect();

    let f0_track = pitch_track(&signal, sr);
    let f0_mean = safe_mean(&f0_track);
    let f0_std = safe_std(&f0_track);
    let jitter = pitch_jitter(&f0_track, f0_mean);

    FeatureVector {
        duration_s,
        rms_mean: safe_mean(&rms_track),
        rms_var: safe_std(&rms_track),
        zcr_mean: safe_mean(&zcr_track),
        centroid_mean: safe_mean(&centroid_track),
        flatness_mean: safe_mean(&flatness_track),
        rolloff_mean: safe_mean(&rolloff_track),
        mfcc_std_mean: safe_mean(&mfcc_stds),
        f0_mean,
        f0_std,
        jitter,
    }
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

/// Start offsets of analysis frames; a too-short signal yields one padded
/// frame so every waveform produces at least one observation.
fn frame_starts(len: usize) -> Vec<usize> {
    if len < FRAME_LEN {
        vec![0]
    } else {
        (0..=len - FRAME_LEN).step_by(HOP_LEN).collect()
    }
}

/// Copy one frame, zero-padding past the end of the signal.
fn padded_frame(signal: &[f64], start: usize) -> Vec<f64> {
    let mut frame = vec![0.0f64; FRAME_LEN];
    let available = signal.len().saturating_sub(start).min(FRAME_LEN);
    frame[..available].copy_from_slice(&signal[start..start + available]);
    frame
}

fn hann_window() -> Vec<f64> {
    (0..FRAME_LEN)
        .map(|i| {
            let phase = std::f64::consts::TAU * i as f64 / FRAME_LEN as f64;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Frame measures
// ---------------------------------------------------------------------------

fn frame_rms(frame: &[f64]) -> f64 {
    let energy: f64 = frame.iter().map(|s| s * s).sum();
    (energy / frame.len() as f64).sqrt()
}

fn frame_zcr(frame: &[f64]) -> f64 {
    let crossings = frame
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f64 / frame.len() as f64
}

/// Amplitude-weighted mean frequency. `None` for silent frames.
fn spectral_centroid(magnitudes: &[f64], sr: f64) -> Option<f64> {
    let total: f64 = magnitudes.iter().sum();
    if total <= LOG_EPS {
        return None;
    }
    let weighted: f64 = magnitudes
        .iter()
        .enumerate()
        .map(|(k, m)| bin_freq(k, sr) * m)
        .sum();
    Some(weighted / total)
}

/// Geometric over arithmetic mean of the power spectrum.
fn spectral_flatness(magnitudes: &[f64]) -> f64 {
    let n = magnitudes.len() as f64;
    let mut log_sum = 0.0;
    let mut sum = 0.0;
    for m in magnitudes {
        let power = m * m + LOG_EPS;
        log_sum += power.ln();
        sum += power;
    }
    let geometric = (log_sum / n).exp();
    let arithmetic = sum / n;
    geometric / arithmetic
}

/// Frequency below which `ROLLOFF_FRACTION` of the magnitude lies.
fn spectral_rolloff(magnitudes: &[f64], sr: f64) -> Option<f64> {
    let total: f64 = magnitudes.iter().sum();
    if total <= LOG_EPS {
        return None;
    }
    let threshold = ROLLOFF_FRACTION * total;
    let mut cumulative = 0.0;
    for (k, m) in magnitudes.iter().enumerate() {
        cumulative += m;
        if cumulative >= threshold {
            return Some(bin_freq(k, sr));
        }
    }
    Some(bin_freq(magnitudes.len() - 1, sr))
}

fn bin_freq(k: usize, sr: f64) -> f64 {
    k as f64 * sr / FRAME_LEN as f64
}

// ---------------------------------------------------------------------------
// Cepstral track
// ---------------------------------------------------------------------------

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank over the spectrum bins, `N_MELS` filters from
/// 0 Hz to Nyquist.
fn mel_filterbank(sr: f64) -> Vec<Vec<f64>> {
    let bins = FRAME_LEN / 2 + 1;
    let max_mel = hz_to_mel(sr / 2.0);
    let edges: Vec<f64> = (0..N_MELS + 2)
        .map(|i| mel_to_hz(max_mel * i as f64 / (N_MELS + 1) as f64))
        .collect();

    (0..N_MELS)
        .map(|m| {
            let (lo, center, hi) = (edges[m], edges[m + 1], edges[m + 2]);
            (0..bins)
                .map(|k| {
                    let f = bin_freq(k, sr);
                    let rising = (f - lo) / (center - lo).max(LOG_EPS);
                    let falling = (hi - f) / (hi - center).max(LOG_EPS);
                    rising.min(falling).max(0.0)
                })
                .collect()
        })
        .collect()
}

/// 13 cepstral coefficients: mel power, log, orthonormal DCT-II.
fn mfcc(magnitudes: &[f64], filterbank: &[Vec<f64>]) -> Vec<f64> {
    let log_mel: Vec<f64> = filterbank
        .iter()
        .map(|filter| {
            let energy: f64 = filter
                .iter()
                .zip(magnitudes)
                .map(|(w, m)| w * m * m)
                .sum();
            10.0 * (energy + LOG_EPS).log10()
        })
        .collect();

    let n = log_mel.len() as f64;
    (0..N_MFCC)
        .map(|i| {
            let scale = if i == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            let sum: f64 = log_mel
                .iter()
                .enumerate()
                .map(|(m, v)| v * (std::f64::consts::PI * i as f64 * (m as f64 + 0.5) / n).cos())
                .sum();
            scale * sum
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pitch
// ---------------------------------------------------------------------------

/// YIN pitch estimates per frame, already filtered to the keep band.
fn pitch_track(signal: &[f64], sr: f64) -> Vec<f64> {
    frame_starts(signal.len())
        .iter()
        .filter_map(|&start| {
            let frame = padded_frame(signal, start);
            yin_f0(&frame, sr)
        })
        .filter(|f0| f0.is_finite() && *f0 > F0_KEEP_LO_HZ && *f0 < F0_KEEP_HI_HZ)
        .collect()
}

/// Single-frame YIN estimate restricted to the extraction band.
///
/// Classic formulation: squared-difference function over half the frame,
/// cumulative-mean normalization, absolute threshold with fallthrough to the
/// global minimum, parabolic refinement of the chosen lag.
fn yin_f0(frame: &[f64], sr: f64) -> Option<f64> {
    let w = FRAME_LEN / 2;
    // Silent frames carry no pitch.
    let energy: f64 = frame.iter().map(|s| s * s).sum();
    if !energy.is_finite() || energy <= LOG_EPS {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let tau_min = ((sr / F0_MAX_HZ) as usize).max(2);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let tau_max = ((sr / F0_MIN_HZ) as usize).min(w - 1);
    if tau_min >= tau_max {
        return None;
    }

    // Squared difference function.
    let mut diff = vec![0.0f64; tau_max + 1];
    for (tau, slot) in diff.iter_mut().enumerate().skip(1) {
        let mut acc = 0.0;
        for j in 0..w {
            let delta = frame[j] - frame[j + tau];
            acc += delta * delta;
        }
        *slot = acc;
    }

    // Cumulative mean normalized difference.
    let mut cmnd = vec![1.0f64; tau_max + 1];
    let mut running = 0.0;
    for tau in 1..=tau_max {
        running += diff[tau];
        cmnd[tau] = if running > LOG_EPS {
            diff[tau] * tau as f64 / running
        } else {
            1.0
        };
    }

    // First dip under the threshold wins; walk down to its local minimum.
    let mut tau = (tau_min..=tau_max).find(|&t| cmnd[t] < YIN_THRESHOLD);
    if let Some(ref mut t) = tau {
        while *t + 1 <= tau_max && cmnd[*t + 1] < cmnd[*t] {
            *t += 1;
        }
    }
    // No dip: fall back to the global minimum of the band.
    let tau = tau.or_else(|| {
        (tau_min..=tau_max).min_by(|&a, &b| {
            cmnd[a]
                .partial_cmp(&cmnd[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    })?;

    // A dip no better than the running average means unvoiced.
    if !cmnd[tau].is_finite() || cmnd[tau] >= 1.0 {
        return None;
    }

    let refined = parabolic_refine(&cmnd, tau, tau_min, tau_max);
    Some(sr / refined)
}

/// Parabolic interpolation of the minimum around integer lag `tau`.
fn parabolic_refine(cmnd: &[f64], tau: usize, tau_min: usize, tau_max: usize) -> f64 {
    if tau <= tau_min || tau >= tau_max {
        return tau as f64;
    }
    let (left, mid, right) = (cmnd[tau - 1], cmnd[tau], cmnd[tau + 1]);
    let denom = left + right - 2.0 * mid;
    if denom.abs() <= LOG_EPS {
        return tau as f64;
    }
    let offset = (left - right) / (2.0 * denom);
    tau as f64 + offset.clamp(-1.0, 1.0)
}

/// Median absolute frame-to-frame delta normalized by the mean, 0.0 when the
/// track is too short or essentially unpitched.
fn pitch_jitter(f0_track: &[f64], f0_mean: f64) -> f64 {
    if f0_track.len() < 4 || f0_mean <= 1e-6 {
        return 0.0;
    }
    let mut deltas: Vec<f64> = f0_track.windows(2).map(|p| (p[1] - p[0]).abs()).collect();
    median(&mut deltas) / f0_mean
}

// ---------------------------------------------------------------------------
// Safe reductions
// ---------------------------------------------------------------------------

/// Mean over the finite subset; 0.0 when nothing survives.
fn safe_mean(values: &[f64]) -> f64 {
    let mut count = 0usize;
    let mut sum = 0.0;
    for &v in values {
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Population standard deviation over the finite subset; 0.0 when empty.
fn safe_std(values: &[f64]) -> f64 {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let variance = finite.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / finite.len() as f64;
    variance.sqrt()
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
