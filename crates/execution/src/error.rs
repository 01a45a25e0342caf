//! Execution error types.

use thiserror::Error;

use crate::status::CallStatus;

/// Errors raised when a call record is driven through an illegal path.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A status transition is not valid for the current status.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: CallStatus,
        /// Attempted target status.
        to: CallStatus,
    },

    /// A serialization or deserialization error.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExecutionError {
    /// Create an invalid-transition error.
    pub fn invalid_transition(from: CallStatus, to: CallStatus) -> Self {
        Self::InvalidTransition { from, to }
    }
}
