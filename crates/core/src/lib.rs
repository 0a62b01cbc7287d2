//! Core types shared across the Voxguard pipeline: job identity, the job
//! record and its status state machine, and the immutable analysis result.

pub mod job;
pub mod result;
pub mod types;

pub use job::{JobRecord, JobStatus};
pub use result::{AnalysisResult, ResultMeta};
pub use types::JobId;

/// Service version stamped into result metadata.
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
