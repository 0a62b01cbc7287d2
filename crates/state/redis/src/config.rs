use std::time::Duration;

/// Connection settings for the Redis backend.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379`.
    pub url: String,
    /// Key prefix applied to every key this backend writes.
    pub prefix: String,
    /// Name of the analysis queue list.
    pub queue_name: String,
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// Bound on waiting for (or creating) a pooled connection.
    pub op_timeout: Duration,
}

impl RedisConfig {
    /// Create a config for the given URL with default pool settings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_owned(),
            prefix: "voxguard".to_owned(),
            queue_name: "analysis".to_owned(),
            pool_size: 16,
            op_timeout: Duration::from_secs(5),
        }
    }
}
