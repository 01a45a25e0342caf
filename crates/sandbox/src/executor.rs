use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SandboxError;
use crate::protocol::{ChildReport, InvocationEnvelope, MetadataReport};

/// How one execution-mode run ended, short of failing to start.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The worker exited 0 and printed a valid report.
    Reported(ChildReport),
    /// The worker exited non-zero or was killed by a signal.
    Crashed {
        /// Exit code, `None` for a signal.
        exit_code: Option<i32>,
        /// Tail of stderr.
        stderr: String,
    },
    /// The worker exited 0 but stdout was not a report.
    InvalidOutput {
        /// Parse failure.
        detail: String,
        /// Tail of stderr.
        stderr: String,
    },
    /// The report line ran past the executor's output bound; the process
    /// group was killed before the rest was read.
    OversizedOutput {
        /// Bound in bytes, excluding the newline.
        limit: usize,
    },
    /// The wall-clock limit passed; the process group was killed and reaped.
    TimedOut {
        /// Limit that was exceeded.
        after: Duration,
    },
}

impl RunOutcome {
    /// The worker completed the protocol; its environment is healthy.
    #[must_use]
    pub fn is_reported(&self) -> bool {
        matches!(self, Self::Reported(_))
    }
}

/// Runs function files outside the host process.
///
/// Implementations must be safe to call concurrently; the engine shares one
/// executor across every in-flight call.
#[async_trait]
pub trait IsolatedExecutor: Send + Sync {
    /// Load `file` in metadata mode and return what it registers.
    async fn extract_metadata(
        &self,
        file: &Path,
        timeout: Duration,
    ) -> Result<MetadataReport, SandboxError>;

    /// Resolve the dependencies of `file` so later runs start warm.
    async fn sync_dependencies(&self, file: &Path, timeout: Duration) -> Result<(), SandboxError>;

    /// Execute `file` once.
    ///
    /// `Err` means the worker never started; every later failure is a
    /// [`RunOutcome`].
    async fn run(
        &self,
        file: &Path,
        envelope: &InvocationEnvelope,
        timeout: Duration,
    ) -> Result<RunOutcome, SandboxError>;
}
