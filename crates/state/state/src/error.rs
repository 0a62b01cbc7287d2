use thiserror::Error;

/// Errors from state store and queue operations.
///
/// Backend failures surface here and are logged by callers; they never
/// silently change which backend is in use.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),
}
