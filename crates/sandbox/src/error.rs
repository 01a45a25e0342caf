use std::time::Duration;

/// Failures of metadata extraction and dependency sync, and of spawning
/// the worker at all.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// The worker program could not be started.
    #[error("failed to spawn worker `{program}`: {source}")]
    Spawn {
        /// Program that was launched.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Pipe IO with a running worker failed.
    #[error("worker io: {0}")]
    Io(#[from] std::io::Error),

    /// The worker did not finish in time and was killed.
    #[error("worker timed out after {}s", .after.as_secs_f64())]
    Timeout {
        /// Limit that was exceeded.
        after: Duration,
    },

    /// The worker exited unsuccessfully.
    #[error("worker exited with {}: {stderr}", exit_label(*.code))]
    Exited {
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        /// Tail of the worker's stderr.
        stderr: String,
    },

    /// The worker exited cleanly but its stdout was not the expected JSON.
    #[error("invalid worker output: {detail}")]
    InvalidOutput {
        /// Parse failure.
        detail: String,
        /// Tail of the worker's stderr.
        stderr: String,
    },

    /// The request could not be serialized.
    #[error("serialize request: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SandboxError {
    /// `true` for [`SandboxError::Timeout`].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub(crate) fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "signal".to_owned(), |c| format!("code {c}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exited_message_includes_code_and_stderr() {
        let err = SandboxError::Exited {
            code: Some(2),
            stderr: "boom".into(),
        };
        assert_eq!(err.to_string(), "worker exited with code 2: boom");

        let killed = SandboxError::Exited {
            code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("signal"));
    }

    #[test]
    fn timeout_is_flagged() {
        let err = SandboxError::Timeout {
            after: Duration::from_millis(1500),
        };
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "worker timed out after 1.5s");
    }
}
