use std::time::Duration;

use async_trait::async_trait;

use crate::error::StateError;

/// FIFO handoff of job ids from admission to workers.
///
/// The queue carries opaque id strings only — payloads stay in the stores.
///
/// Delivery is at-most-once, best-effort: a worker that pops an id and
/// crashes before finishing loses that job permanently. There is no
/// visibility timeout and no re-queue; stronger guarantees are an explicit
/// non-goal of this pipeline.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a job id to the tail of the queue.
    async fn push(&self, job_id: &str) -> Result<(), StateError>;

    /// Pop the head of the queue, waiting up to `timeout` for an item.
    /// Returns `None` on timeout; never blocks forever.
    async fn pop_blocking(&self, timeout: Duration) -> Result<Option<String>, StateError>;
}
