use thiserror::Error;

/// Closed set of analysis failures.
///
/// Each variant's display form starts with its stable kind string; that
/// string is what ends up (truncated) on a failed job record, so it must
/// never grow stack traces or unbounded tool output.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The transcode fallback needs ffmpeg and it is not on PATH.
    #[error("ffmpeg_not_installed")]
    FfmpegNotInstalled,

    /// ffmpeg ran but exited non-zero; carries the trailing stderr text.
    #[error("ffmpeg_convert_failed: {0}")]
    FfmpegConvertFailed(String),

    /// The decoded sample is shorter than the configured floor.
    #[error("too_short_audio: {duration_s:.3}s is below the {min_s:.3}s minimum")]
    TooShortAudio { duration_s: f64, min_s: f64 },

    /// Neither decode stage produced a usable waveform.
    #[error("invalid_audio: {0}")]
    InvalidAudio(String),

    /// Scratch-file or subprocess plumbing failure.
    #[error("processing_error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// Stable machine-readable kind string.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FfmpegNotInstalled => "ffmpeg_not_installed",
            Self::FfmpegConvertFailed(_) => "ffmpeg_convert_failed",
            Self::TooShortAudio { .. } => "too_short_audio",
            Self::InvalidAudio(_) => "invalid_audio",
            Self::Io(_) => "processing_error",
        }
    }
}
