use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::ServerError;

/// Top-level configuration, loaded from a TOML file.
///
/// Every section has defaults so a missing file boots a self-contained
/// instance on the in-memory backend.
#[derive(Debug, Default, Deserialize)]
pub struct VoxguardConfig {
    /// State backend configuration (stores + queue).
    #[serde(default)]
    pub state: StateConfig,
    /// Queue naming.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Audit trail configuration.
    #[serde(default)]
    pub audit: AuditConfig,
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Fixed-window rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Worker loop configuration.
    #[serde(default)]
    pub worker: WorkerSectionConfig,
    /// Decode and analysis parameters.
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Record and blob lifetimes.
    #[serde(default)]
    pub jobs: JobsConfig,
}

impl VoxguardConfig {
    /// Load from `path`, falling back to defaults when the file is absent.
    pub fn load(path: &str) -> Result<Self, ServerError> {
        if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents).map_err(|e| ServerError::Config(e.to_string()))
        } else {
            info!(path = %path, "config file not found, using defaults");
            Ok(Self::default())
        }
    }
}

/// Configuration for the state store backend.
#[derive(Debug, Deserialize)]
pub struct StateConfig {
    /// Which backend to use: `"memory"` or `"redis"`. Chosen once at
    /// startup; never switched per call.
    #[serde(default = "default_state_backend")]
    pub backend: String,
    /// Connection URL for the backend (e.g. `redis://localhost:6379`).
    pub url: Option<String>,
    /// Key prefix for the shared backend. Defaults to `"voxguard"`.
    pub prefix: Option<String>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: default_state_backend(),
            url: None,
            prefix: None,
        }
    }
}

fn default_state_backend() -> String {
    "memory".to_owned()
}

/// Queue naming configuration.
#[derive(Debug, Deserialize)]
pub struct QueueConfig {
    /// Name of the analysis queue.
    #[serde(default = "default_queue_name")]
    pub name: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
        }
    }
}

fn default_queue_name() -> String {
    "analysis".to_owned()
}

/// Configuration for the audit trail.
#[derive(Debug, Deserialize)]
pub struct AuditConfig {
    /// Whether audit recording is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Which backend to use: `"memory"` or `"postgres"`.
    #[serde(default = "default_audit_backend")]
    pub backend: String,
    /// Connection URL for the audit backend (used by postgres).
    pub url: Option<String>,
    /// Table prefix for the audit backend.
    #[serde(default = "default_audit_prefix")]
    pub prefix: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: default_audit_backend(),
            url: None,
            prefix: default_audit_prefix(),
        }
    }
}

fn default_audit_backend() -> String {
    "memory".to_owned()
}

fn default_audit_prefix() -> String {
    "voxguard_".to_owned()
}

/// HTTP server bind configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Uploads larger than this are rejected at admission.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

/// Fixed-window rate limiting per client key.
#[derive(Debug, Deserialize)]
pub struct RateLimitConfig {
    /// Whether admission rate limiting is enabled.
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Window length in seconds.
    #[serde(default = "default_rl_window")]
    pub window_seconds: u64,
    /// Maximum admitted requests per window.
    #[serde(default = "default_rl_max")]
    pub max_requests: u64,
    /// Behavior when the state store is unavailable.
    #[serde(default)]
    pub on_error: RateLimitErrorBehavior,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            window_seconds: default_rl_window(),
            max_requests: default_rl_max(),
            on_error: RateLimitErrorBehavior::default(),
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_rl_window() -> u64 {
    60
}

fn default_rl_max() -> u64 {
    30
}

/// Behavior when the rate limiter's state store is unavailable.
#[derive(Debug, Default, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitErrorBehavior {
    /// Allow requests through (fail-open).
    #[default]
    Allow,
    /// Deny requests (fail-closed).
    Deny,
}

/// Worker loop configuration.
#[derive(Debug, Deserialize)]
pub struct WorkerSectionConfig {
    /// Bound on each blocking queue pop, in seconds.
    #[serde(default = "default_pop_timeout")]
    pub pop_timeout_seconds: u64,
}

impl Default for WorkerSectionConfig {
    fn default() -> Self {
        Self {
            pop_timeout_seconds: default_pop_timeout(),
        }
    }
}

fn default_pop_timeout() -> u64 {
    30
}

/// Decode and analysis parameters.
#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    /// Sample rate every waveform is resampled to.
    #[serde(default = "default_sample_rate")]
    pub target_sample_rate: u32,
    /// Samples shorter than this fail with `too_short_audio`.
    #[serde(default = "default_min_duration")]
    pub min_duration_s: f64,
    /// Samples are truncated to this length before analysis.
    #[serde(default = "default_max_duration")]
    pub max_duration_s: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: default_sample_rate(),
            min_duration_s: default_min_duration(),
            max_duration_s: default_max_duration(),
        }
    }
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_min_duration() -> f64 {
    0.6
}

fn default_max_duration() -> f64 {
    120.0
}

/// Record and blob lifetimes. The audio TTL must stay shorter than the job
/// TTL so an expired blob always leaves an observable failed job behind.
#[derive(Debug, Deserialize)]
pub struct JobsConfig {
    /// Job record lifetime in seconds.
    #[serde(default = "default_job_ttl")]
    pub job_ttl_seconds: u64,
    /// Audio blob lifetime in seconds.
    #[serde(default = "default_audio_ttl")]
    pub audio_ttl_seconds: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            job_ttl_seconds: default_job_ttl(),
            audio_ttl_seconds: default_audio_ttl(),
        }
    }
}

fn default_job_ttl() -> u64 {
    3600
}

fn default_audio_ttl() -> u64 {
    600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: VoxguardConfig = toml::from_str("").unwrap();
        assert_eq!(config.state.backend, "memory");
        assert_eq!(config.queue.name, "analysis");
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.rate_limit.max_requests, 30);
        assert_eq!(config.analysis.target_sample_rate, 16_000);
        assert!(config.jobs.audio_ttl_seconds < config.jobs.job_ttl_seconds);
    }

    #[test]
    fn sections_override_independently() {
        let config: VoxguardConfig = toml::from_str(
            r#"
            [state]
            backend = "redis"
            url = "redis://cache:6379"

            [rate_limit]
            max_requests = 3
            on_error = "deny"

            [analysis]
            min_duration_s = 1.0
            "#,
        )
        .unwrap();

        assert_eq!(config.state.backend, "redis");
        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(config.rate_limit.on_error, RateLimitErrorBehavior::Deny);
        assert!((config.analysis.min_duration_s - 1.0).abs() < f64::EPSILON);
        // Untouched sections keep defaults.
        assert_eq!(config.server.port, 8080);
    }
}
