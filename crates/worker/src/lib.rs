//! Queue-driven analysis worker.
//!
//! Each worker instance runs a single-threaded loop: block-pop the queue
//! with a bounded timeout, process one job fully, repeat. Horizontal scaling
//! is achieved purely by running more instances against the shared backend;
//! a single job is never split across workers and never suspends to accept
//! another.

mod worker;

pub use worker::{Worker, WorkerConfig, AUDIO_MISSING_KIND};
