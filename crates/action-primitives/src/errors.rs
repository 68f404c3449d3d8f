//! Error types for page probe operations

use thiserror::Error;

/// Errors raised while probing or acting on the live UI surface
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The target vanished or rejected the action between probe and act
    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// Operation was cancelled or interrupted
    #[error("Operation interrupted: {0}")]
    Interrupted(String),

    /// A placeholder referenced a record field that is not supplied
    #[error("Missing field: {0}")]
    MissingField(String),

    /// CDP communication or protocol error
    #[error("CDP I/O error: {0}")]
    CdpIo(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProbeError {
    /// Transient errors are treated as "condition not met yet" while polling.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProbeError::CdpIo(_))
    }
}
