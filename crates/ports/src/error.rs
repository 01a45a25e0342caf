//! Error types for port operations.
//!
//! Every port method returns `Result<_, PortsError>`. Drivers map their
//! internal errors into these variants so callers can tell transient faults
//! from permanent ones without knowing the concrete backend.

use std::time::Duration;

/// Error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortsError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity (e.g. "FunctionCall", "Schedule").
        entity: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// A row with the same identity already exists.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Kind of entity.
        entity: String,
        /// Identifier of the existing row.
        id: String,
    },

    /// Backend connection failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation exceeded its timeout.
    #[error("timeout: {operation} after {duration:?}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// How long was waited before giving up.
        duration: Duration,
    },

    /// Catch-all internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PortsError {
    /// Convenience constructor for [`PortsError::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Convenience constructor for [`PortsError::AlreadyExists`].
    pub fn already_exists(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Convenience constructor for [`PortsError::Timeout`].
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Returns `true` for transient errors worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for PortsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_not_found() {
        let err = PortsError::not_found("FunctionCall", "c-1");
        assert_eq!(err.to_string(), "FunctionCall not found: c-1");
    }

    #[test]
    fn display_already_exists() {
        let err = PortsError::already_exists("FunctionVersion", "double@abc");
        assert_eq!(err.to_string(), "FunctionVersion already exists: double@abc");
    }

    #[test]
    fn retryable_classification() {
        assert!(PortsError::Connection("refused".into()).is_retryable());
        assert!(PortsError::timeout("insert", Duration::from_secs(1)).is_retryable());
        assert!(!PortsError::not_found("X", "1").is_retryable());
        assert!(!PortsError::already_exists("X", "1").is_retryable());
        assert!(!PortsError::Internal("oops".into()).is_retryable());
    }

    #[test]
    fn from_serde_json_error() {
        let serde_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PortsError = serde_err.into();
        assert!(matches!(err, PortsError::Serialization(msg) if !msg.is_empty()));
    }
}
