use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use voxguard_state::{StateKey, StateStore};

use crate::config::{RateLimitConfig, RateLimitErrorBehavior};

/// Bucket identifier for requests with no client address.
pub const ANONYMOUS_BUCKET: &str = "_anonymous";

/// Result of an admitted rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    /// The configured per-window limit.
    pub limit: u64,
    /// Remaining requests in the current window.
    pub remaining: u64,
    /// Seconds until the current window resets.
    pub reset_after: u64,
}

/// Error returned when the rate limit is exceeded.
#[derive(Debug)]
pub struct RateLimitExceeded {
    /// Seconds until the caller can retry.
    pub retry_after: u64,
    /// The configured limit.
    pub limit: u64,
}

/// Distributed fixed-window rate limiter using `StateStore::increment()`
/// for atomic counters, so it works across admission instances on any
/// shared backend.
///
/// Counts land in contiguous, non-overlapping buckets keyed by
/// `(client, floor(now / window))`. There is no smoothing across the
/// boundary: a client can legally burst up to `2 x max` across two adjacent
/// windows. That behavior is part of the contract, not an accident.
pub struct RateLimiter {
    store: Arc<dyn StateStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a new rate limiter.
    pub fn new(store: Arc<dyn StateStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Get the rate limit configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and record a request for the given client key.
    ///
    /// Each call increments the window counter; the request is admitted iff
    /// the incremented value is within the limit. On state store errors,
    /// behavior follows the configured fail-open/fail-closed policy.
    pub async fn allow(&self, key: &str) -> Result<RateLimitResult, RateLimitExceeded> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.check_at(key, now).await
    }

    /// Core check against an explicit clock, so window-boundary behavior is
    /// directly testable.
    async fn check_at(&self, key: &str, now: u64) -> Result<RateLimitResult, RateLimitExceeded> {
        let window = self.config.window_seconds.max(1);
        let limit = self.config.max_requests;

        let window_start = (now / window) * window;
        let elapsed = now - window_start;
        let reset_after = window - elapsed;

        let bucket = StateKey::rate_limit(format!("{key}:{window_start}"));
        // Counters expire after two windows; the next index takes over
        // implicitly, no cleanup pass needed.
        let ttl = Duration::from_secs(window * 2);

        let count = match self.store.increment(&bucket, 1, Some(ttl)).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "rate limiter: counter increment failed");
                return self.handle_store_error(reset_after);
            }
        };

        let count = u64::try_from(count).unwrap_or(u64::MAX);
        if count <= limit {
            Ok(RateLimitResult {
                limit,
                remaining: limit.saturating_sub(count),
                reset_after,
            })
        } else {
            Err(RateLimitExceeded {
                retry_after: reset_after.max(1),
                limit,
            })
        }
    }

    /// Apply the configured behavior when the store is unreachable.
    fn handle_store_error(
        &self,
        reset_after: u64,
    ) -> Result<RateLimitResult, RateLimitExceeded> {
        match self.config.on_error {
            RateLimitErrorBehavior::Allow => Ok(RateLimitResult {
                limit: self.config.max_requests,
                remaining: self.config.max_requests,
                reset_after,
            }),
            RateLimitErrorBehavior::Deny => Err(RateLimitExceeded {
                retry_after: reset_after.max(1),
                limit: self.config.max_requests,
            }),
        }
    }
}
