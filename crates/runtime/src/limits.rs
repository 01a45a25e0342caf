//! Size and time limits applied to every invocation.
//!
//! Keeps a runaway payload or result from exhausting host memory.

use std::time::Duration;

use nimbus_config::Settings;

/// Limits the engine enforces around one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Largest serialized payload accepted (default: 1 MiB).
    pub max_payload_bytes: usize,
    /// Largest serialized result accepted (default: 1 MiB).
    pub max_result_bytes: usize,
    /// Wall-clock limit per call (default: 30 s).
    pub timeout: Duration,
    /// Lifetime of the internal token minted per call (default: 5 min).
    pub token_ttl: Duration,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ExecutionLimits {
    /// Limits taken from the `execution` and `scheduler` sections.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_payload_bytes: settings.execution.max_payload_bytes,
            max_result_bytes: settings.execution.max_result_bytes,
            timeout: settings.function_timeout(),
            token_ttl: settings.execution.token_ttl(),
        }
    }

    /// Check a serialized payload against the payload limit.
    ///
    /// Returns `Ok(size)` if within limits, or `Err((limit, actual))` if exceeded.
    pub fn check_payload_size(&self, serialized: &[u8]) -> Result<usize, (usize, usize)> {
        check(serialized.len(), self.max_payload_bytes)
    }

    /// Check a result value against the result limit.
    ///
    /// Returns `Ok(size)` if within limits, or `Err((limit, actual))` if exceeded.
    pub fn check_result_size(&self, result: &serde_json::Value) -> Result<usize, (usize, usize)> {
        let size = serde_json::to_vec(result).map_or(0, |v| v.len());
        check(size, self.max_result_bytes)
    }
}

fn check(size: usize, limit: usize) -> Result<usize, (usize, usize)> {
    if size > limit {
        Err((limit, size))
    } else {
        Ok(size)
    }
}
