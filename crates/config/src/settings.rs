//! Static settings, read once at start.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Root of the static configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How to launch the worker program.
    pub executor: ExecutorSettings,
    /// Per-invocation limits.
    pub execution: ExecutionSettings,
    /// Warm pool sizing.
    pub pool: PoolSettings,
    /// Directory loading.
    pub loader: LoaderSettings,
    /// Scheduler loop.
    pub scheduler: SchedulerSettings,
    /// Source admission.
    pub validation: ValidationSettings,
}

impl Settings {
    /// Wall-clock limit for one invocation.
    ///
    /// `execution.timeout_secs` wins; otherwise the scheduler's
    /// `function_timeout_secs` applies.
    #[must_use]
    pub fn function_timeout(&self) -> Duration {
        Duration::from_secs(
            self.execution
                .timeout_secs
                .unwrap_or(self.scheduler.function_timeout_secs),
        )
    }

    /// Reject combinations that would make the runtime misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor.program.trim().is_empty() {
            return Err(ConfigError::validation("executor.program", "must not be empty"));
        }
        if self.executor.max_output_bytes < self.execution.max_result_bytes {
            return Err(ConfigError::validation(
                "executor.max_output_bytes",
                "must be at least execution.max_result_bytes",
            ));
        }
        if self.function_timeout().is_zero() {
            return Err(ConfigError::validation(
                "execution.timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.loader.concurrency == 0 {
            return Err(ConfigError::validation("loader.concurrency", "must be at least 1"));
        }
        if self.scheduler.interval_seconds == 0 {
            return Err(ConfigError::validation(
                "scheduler.interval_seconds",
                "must be greater than zero",
            ));
        }
        if self.pool.cleanup_interval_secs == 0 {
            return Err(ConfigError::validation(
                "pool.cleanup_interval_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// The isolated worker program.
///
/// Invoked as `<program> <args...> <file> [--metadata|--sync]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// Executable, resolved through `PATH`.
    pub program: String,
    /// Arguments placed before the function file.
    pub args: Vec<String>,
    /// Extra environment for the worker.
    pub env: BTreeMap<String, String>,
    /// Bytes of stderr kept for crash messages.
    pub stderr_tail_bytes: usize,
    /// Longest report line read from the worker's stdout. Must leave room
    /// for `execution.max_result_bytes` plus the report envelope.
    pub max_output_bytes: usize,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            program: "nimbus-worker".to_owned(),
            args: Vec::new(),
            env: BTreeMap::new(),
            stderr_tail_bytes: 4096,
            max_output_bytes: 1024 * 1024 + 64 * 1024,
        }
    }
}

/// Limits applied to every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Wall-clock limit. Falls back to `scheduler.function_timeout_secs`.
    pub timeout_secs: Option<u64>,
    /// Largest serialized payload accepted.
    pub max_payload_bytes: usize,
    /// Largest serialized result accepted.
    pub max_result_bytes: usize,
    /// Lifetime of the internal token minted per call.
    pub token_ttl_minutes: u64,
    /// Base URL the worker uses to call back into the host API.
    pub api_base_url: String,
}

impl ExecutionSettings {
    /// Token lifetime as a [`Duration`].
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_minutes.saturating_mul(60))
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_payload_bytes: 1024 * 1024,
            max_result_bytes: 1024 * 1024,
            token_ttl_minutes: 5,
            api_base_url: "http://127.0.0.1:8090".to_owned(),
        }
    }
}

/// Warm pool sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Entries kept per function. `0` disables the pool.
    pub max_pool_size: usize,
    /// Entry lifetime. `0` disables eviction.
    pub ttl_seconds: u64,
    /// Period of the background sweep.
    pub cleanup_interval_secs: u64,
}

impl PoolSettings {
    /// Entry lifetime, `None` when eviction is disabled.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_seconds > 0).then(|| Duration::from_secs(self.ttl_seconds))
    }

    /// Sweep period.
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_pool_size: 3,
            ttl_seconds: 300,
            cleanup_interval_secs: 60,
        }
    }
}

/// Function directory loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Directory scanned at start.
    pub functions_dir: PathBuf,
    /// Metadata extractions run at once.
    pub concurrency: usize,
    /// Limit for one metadata extraction, including first-time dependency fetch.
    pub metadata_timeout_secs: u64,
    /// Limit for one dependency sync during pre-warm.
    pub sync_timeout_secs: u64,
    /// Record a version row for each loaded file.
    pub track_versions: bool,
}

impl LoaderSettings {
    /// Metadata timeout as a [`Duration`].
    #[must_use]
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    /// Sync timeout as a [`Duration`].
    #[must_use]
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            functions_dir: PathBuf::from("functions"),
            concurrency: 4,
            metadata_timeout_secs: 60,
            sync_timeout_secs: 120,
            track_versions: true,
        }
    }
}

/// Scheduler loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Start the loop with the host.
    pub enabled: bool,
    /// Sleep between ticks.
    pub interval_seconds: u64,
    /// IANA timezone cron expressions are evaluated in.
    pub timezone: String,
    /// Default invocation limit when `execution.timeout_secs` is unset.
    pub function_timeout_secs: u64,
}

impl SchedulerSettings {
    /// Tick period as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
            timezone: "UTC".to_owned(),
            function_timeout_secs: 30,
        }
    }
}

/// Source admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Largest accepted source file.
    pub max_file_bytes: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
        }
    }
}
