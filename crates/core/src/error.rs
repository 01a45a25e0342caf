//! Errors raised while parsing core value types.

/// Errors from core type conversions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// An auth level string was not one of the known levels.
    #[error("unknown auth level '{0}' (expected public, authenticated or admin)")]
    UnknownAuthLevel(String),

    /// An interval unit string was not recognised.
    #[error("unknown interval unit '{0}'")]
    UnknownIntervalUnit(String),
}
