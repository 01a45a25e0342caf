//! Configuration errors.

use std::path::PathBuf;

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A provider failed or a value had the wrong shape.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// Values parsed but are inconsistent.
    #[error("invalid value for '{key}': {message}")]
    Validation {
        /// Dotted key of the offending value.
        key: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    /// Convenience constructor for [`ConfigError::Validation`].
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Invalid(Box::new(err))
    }
}
