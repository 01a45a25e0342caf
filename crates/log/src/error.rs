//! Logger setup errors.

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The filter directive did not parse.
    #[error("invalid log filter '{directive}': {message}")]
    Filter {
        /// Directive as given.
        directive: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber is already installed.
    #[error("logger already initialised: {0}")]
    AlreadyInitialized(String),
}

/// Result alias for logger setup.
pub type LogResult<T> = Result<T, LogError>;
