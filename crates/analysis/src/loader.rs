#![allow(clippy::cast_precision_loss)]

use std::io::Cursor;
use std::path::Path;

use tokio::process::Command;

use crate::error::AnalysisError;

/// How much trailing ffmpeg stderr is kept on a conversion failure.
const STDERR_TAIL_BYTES: usize = 1400;

/// Epsilon added to the peak before normalizing, so silence divides safely.
const PEAK_EPSILON: f32 = 1e-9;

/// Decode parameters for uploaded samples.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Sample rate every waveform is resampled to before analysis.
    pub target_sample_rate: u32,
    /// Samples shorter than this are rejected with `too_short_audio`.
    pub min_duration_s: f64,
    /// Samples are truncated to this length before feature extraction.
    pub max_duration_s: f64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            min_duration_s: 0.6,
            max_duration_s: 120.0,
        }
    }
}

/// A decoded, normalized mono waveform ready for feature extraction.
#[derive(Debug, Clone)]
pub struct LoadedAudio {
    /// Mono samples, DC-removed and peak-normalized, truncated to the
    /// configured maximum duration.
    pub samples: Vec<f32>,
    /// Sample rate of `samples` (the configured target rate).
    pub sample_rate: u32,
    /// Decoded duration in seconds, measured before truncation.
    pub duration_s: f64,
    /// Which decode stage produced the waveform: `"wav"` or `"ffmpeg"`.
    pub loader: &'static str,
}

/// Two-stage decoder: direct WAV decode first, ffmpeg transcode second.
#[derive(Debug, Clone)]
pub struct AudioLoader {
    config: LoaderConfig,
}

impl AudioLoader {
    /// Create a loader with the given configuration.
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Decode uploaded bytes into a normalized mono waveform.
    ///
    /// Stage 1 decodes WAV payloads in memory. Anything else (or a WAV that
    /// yields no usable waveform) falls through to stage 2, which shells out
    /// to ffmpeg for a mono transcode at the target rate and decodes its
    /// output. First success wins.
    pub async fn load(&self, bytes: &[u8]) -> Result<LoadedAudio, AnalysisError> {
        let target_sr = self.config.target_sample_rate;

        let (samples, loader) = match decode_wav(bytes, target_sr) {
            Ok(samples) if !samples.is_empty() => (samples, "wav"),
            _ => {
                tracing::debug!("direct decode failed, trying ffmpeg transcode");
                (self.transcode_and_decode(bytes).await?, "ffmpeg")
            }
        };

        let duration_s = f64::from(u32::try_from(samples.len()).unwrap_or(u32::MAX))
            / f64::from(target_sr);
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(AnalysisError::InvalidAudio(
                "decoded waveform is empty".to_owned(),
            ));
        }
        if duration_s < self.config.min_duration_s {
            return Err(AnalysisError::TooShortAudio {
                duration_s,
                min_s: self.config.min_duration_s,
            });
        }

        let samples = normalize_and_trim(samples, target_sr, self.config.max_duration_s);

        Ok(LoadedAudio {
            samples,
            sample_rate: target_sr,
            duration_s,
            loader,
        })
    }

    /// Stage 2: ffmpeg transcode to mono WAV at the target rate, then decode.
    async fn transcode_and_decode(&self, bytes: &[u8]) -> Result<Vec<f32>, AnalysisError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("input.bin");
        let output = scratch.path().join("converted.wav");
        tokio::fs::write(&input, bytes).await?;

        run_ffmpeg(&input, &output, self.config.target_sample_rate).await?;

        let converted = tokio::fs::read(&output).await?;
        match decode_wav(&converted, self.config.target_sample_rate) {
            Ok(samples) if !samples.is_empty() => Ok(samples),
            Ok(_) => Err(AnalysisError::InvalidAudio(
                "transcoded waveform is empty".to_owned(),
            )),
            Err(e) => Err(AnalysisError::InvalidAudio(format!(
                "transcoded output did not decode: {e}"
            ))),
        }
    }
}

/// Invoke ffmpeg for a forced-mono transcode at `sample_rate`.
async fn run_ffmpeg(
    input: &Path,
    output: &Path,
    sample_rate: u32,
) -> Result<(), AnalysisError> {
    let result = Command::new("ffmpeg")
        .arg("-nostdin")
        .arg("-hide_banner")
        .arg("-loglevel")
        .arg("error")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-ac")
        .arg("1")
        .arg("-ar")
        .arg(sample_rate.to_string())
        .arg("-vn")
        .arg(output)
        .output()
        .await;

    let out = match result {
        Ok(out) => out,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AnalysisError::FfmpegNotInstalled);
        }
        Err(e) => return Err(AnalysisError::Io(e)),
    };

    if out.status.success() {
        Ok(())
    } else {
        Err(AnalysisError::FfmpegConvertFailed(stderr_tail(&out.stderr)))
    }
}

/// The trailing slice of ffmpeg's stderr, bounded so failure messages stay
/// small enough to store on the job record pipeline.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        text.to_owned()
    } else {
        let start = text.len() - STDERR_TAIL_BYTES;
        // Snap forward to a char boundary.
        let mut idx = start;
        while !text.is_char_boundary(idx) {
            idx += 1;
        }
        text[idx..].to_owned()
    }
}

/// Decode a WAV payload to mono f32 at `target_sr`.
///
/// Integer formats are scaled to `[-1, 1]`; multi-channel audio is averaged
/// down to mono; the result is linearly resampled to the target rate.
fn decode_wav(bytes: &[u8], target_sr: u32) -> Result<Vec<f32>, AnalysisError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| AnalysisError::InvalidAudio(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AnalysisError::InvalidAudio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = f32::from(2u8).powi(i32::from(spec.bits_per_sample) - 1);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| AnalysisError::InvalidAudio(e.to_string()))?
        }
    };

    let mono = downmix(&interleaved, spec.channels);
    Ok(resample(&mono, spec.sample_rate, target_sr))
}

/// Average interleaved channels down to one.
fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let channels = usize::from(channels);
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resample.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let out_len = (samples.len() as f64 / ratio).floor() as usize;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let idx = pos as usize;
            let frac = pos - idx as f64;
            let a = f64::from(samples[idx]);
            let b = f64::from(samples[(idx + 1).min(samples.len() - 1)]);
            #[allow(clippy::cast_possible_truncation)]
            let v = (a + (b - a) * frac) as f32;
            v
        })
        .collect()
}

/// Truncate to the duration cap, remove DC offset, peak-normalize.
fn normalize_and_trim(mut samples: Vec<f32>, sample_rate: u32, max_duration_s: f64) -> Vec<f32> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_len = (max_duration_s * f64::from(sample_rate)) as usize;
    if max_len > 0 && samples.len() > max_len {
        samples.truncate(max_len);
    }

    let len = samples.len() as f32;
    let mean = samples.iter().sum::<f32>() / len.max(1.0);
    for s in &mut samples {
        *s -= mean;
    }

    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs())) + PEAK_EPSILON;
    for s in &mut samples {
        *s /= peak;
    }

    samples
}
