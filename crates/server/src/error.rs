use thiserror::Error;

/// Errors that can occur when bootstrapping or running a Voxguard binary.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A state backend error surfaced at startup.
    #[error("state error: {0}")]
    State(#[from] voxguard_state::StateError),

    /// An audit backend error surfaced at startup.
    #[error("audit error: {0}")]
    Audit(#[from] voxguard_audit::AuditError),
}
