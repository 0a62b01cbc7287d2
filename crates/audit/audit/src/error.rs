use thiserror::Error;

/// Errors from audit store operations.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}
