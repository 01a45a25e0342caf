//! Runtime error types.

use std::path::PathBuf;
use std::time::Duration;

use nimbus_ports::PortsError;
use nimbus_sandbox::SandboxError;

/// Errors from the execution engine.
///
/// Failures of user code are never errors; they are recorded on the
/// returned call row. These are faults of the infrastructure around it.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// No function with this name is registered.
    #[error("function not found: {name}")]
    FunctionNotFound {
        /// Name that was looked up.
        name: String,
    },

    /// The call store rejected a write.
    #[error("call store: {0}")]
    Store(#[from] PortsError),

    /// Internal runtime error.
    #[error("runtime error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<nimbus_execution::ExecutionError> for RuntimeError {
    fn from(err: nimbus_execution::ExecutionError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Per-file loading failures. Logged and skipped by directory loads.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The directory or file could not be read.
    #[error("read {}: {source}", .path.display())]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The path is not a loadable function file.
    #[error("not a function file: {}", .0.display())]
    NotEligible(PathBuf),

    /// Metadata extraction failed.
    #[error("metadata for {}: {source}", .path.display())]
    Metadata {
        /// Function file.
        path: PathBuf,
        /// Worker failure.
        #[source]
        source: SandboxError,
    },

    /// Metadata extraction did not finish in time.
    #[error("metadata for {} timed out after {}s", .path.display(), .after.as_secs())]
    Timeout {
        /// Function file.
        path: PathBuf,
        /// Limit that was exceeded.
        after: Duration,
    },

    /// The filesystem watcher could not be started.
    #[error("watch: {0}")]
    Watch(#[from] notify::Error),
}
