use async_trait::async_trait;

use crate::error::AuditError;
use crate::record::AnalysisRow;

/// Listing limits are clamped into this range.
pub const MAX_RECENT_LIMIT: usize = 200;

/// Trait for audit sinks.
///
/// Implementations must be `Send + Sync` to be shared across async tasks.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist one completed analysis.
    async fn record(&self, row: AnalysisRow) -> Result<(), AuditError>;

    /// The most recent rows, newest first. `limit` is clamped to
    /// `1..=MAX_RECENT_LIMIT`.
    async fn recent(&self, limit: usize) -> Result<Vec<AnalysisRow>, AuditError>;
}

/// Clamp a caller-supplied listing limit.
#[must_use]
pub fn effective_limit(limit: usize) -> usize {
    limit.clamp(1, MAX_RECENT_LIMIT)
}
