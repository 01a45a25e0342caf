//! # Nimbus Log
//!
//! Subscriber setup shared by Nimbus binaries.
//!
//! ```rust,no_run
//! let _guard = nimbus_log::init_from_env().expect("logger");
//! tracing::info!(function = "double", "loaded");
//! ```
//!
//! Filter: `NIMBUS_LOG`, then `RUST_LOG`, default `info`.
//! Format: `NIMBUS_LOG_FORMAT` = `pretty` | `compact` | `json`.

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, Format};
pub use error::{LogError, LogResult};

/// Initialise the global subscriber from the environment.
pub fn init_from_env() -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(Config::from_env()).build()
}

/// Initialise the global subscriber with `config`.
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
