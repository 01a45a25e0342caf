//! Failure classification stored on a failed call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a call failed.
///
/// Engine-detected failures have fixed names. Anything the worker reports in
/// its `error_type` field that is not one of those names is kept verbatim as
/// [`CallErrorKind::User`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CallErrorKind {
    /// Serialized payload exceeded the configured limit. No process was spawned.
    PayloadSize,
    /// Serialized result exceeded the configured limit.
    ResultSize,
    /// The wall-clock limit elapsed and the process was killed.
    Timeout,
    /// The worker exited with a non-zero status.
    ExecutorCrash,
    /// The worker exited cleanly but its stdout was not a valid report.
    ExecutorOutput,
    /// The worker process could not be started.
    ExecutorSpawn,
    /// The internal token for the call could not be minted.
    Authorization,
    /// A failure kind named by the function itself.
    User(String),
}

impl CallErrorKind {
    /// Stable string form, as persisted.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::PayloadSize => "PayloadSizeError",
            Self::ResultSize => "ResultSizeError",
            Self::Timeout => "TimeoutError",
            Self::ExecutorCrash => "ExecutorCrashError",
            Self::ExecutorOutput => "ExecutorOutputError",
            Self::ExecutorSpawn => "ExecutorSpawnError",
            Self::Authorization => "AuthorizationError",
            Self::User(name) => name,
        }
    }

    /// Returns `true` for failures detected by the engine rather than the function.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        !matches!(self, Self::User(_))
    }
}

impl fmt::Display for CallErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for CallErrorKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PayloadSizeError" => Self::PayloadSize,
            "ResultSizeError" => Self::ResultSize,
            "TimeoutError" => Self::Timeout,
            "ExecutorCrashError" => Self::ExecutorCrash,
            "ExecutorOutputError" => Self::ExecutorOutput,
            "ExecutorSpawnError" => Self::ExecutorSpawn,
            "AuthorizationError" => Self::Authorization,
            _ => Self::User(value),
        }
    }
}

impl From<&str> for CallErrorKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_owned())
    }
}

impl From<CallErrorKind> for String {
    fn from(kind: CallErrorKind) -> Self {
        match kind {
            CallErrorKind::User(name) => name,
            other => other.as_str().to_owned(),
        }
    }
}
