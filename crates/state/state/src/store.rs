use std::time::Duration;

use async_trait::async_trait;

use crate::error::StateError;
use crate::key::StateKey;

/// Trait for the byte-valued key/value stores backing the pipeline.
///
/// One implementation serves both the job store (JSON-encoded records) and
/// the audio store (raw blobs); the two live in different [`KeyKind`]
/// keyspaces with independent TTLs.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
///
/// [`KeyKind`]: crate::key::KeyKind
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Set a value with an optional TTL, overwriting any previous value.
    /// Idempotent.
    async fn put(
        &self,
        key: &StateKey,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> Result<(), StateError>;

    /// Get the value for a key. Returns `None` if not found or expired —
    /// callers cannot distinguish the two, and must not treat expiry as
    /// failure evidence.
    async fn get(&self, key: &StateKey) -> Result<Option<Vec<u8>>, StateError>;

    /// Delete a key. Best-effort; returns `true` if a live value existed.
    async fn delete(&self, key: &StateKey) -> Result<bool, StateError>;

    /// Atomically increment a counter by `delta`, creating it at 0 first if
    /// absent. The TTL is applied when the counter is created. Returns the
    /// new value.
    async fn increment(
        &self,
        key: &StateKey,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StateError>;
}
