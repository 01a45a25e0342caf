#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nimbus Config
//!
//! Two kinds of settings drive the runtime:
//!
//! - [`Settings`] -- static, read once at process start from defaults, an
//!   optional TOML file, then `NIMBUS_`-prefixed environment variables
//!   (`__` separates nesting, e.g. `NIMBUS_POOL__MAX_POOL_SIZE=5`).
//! - [`DynamicSettings`] -- durable values an operator may change while the
//!   host runs. They are held in a [`LiveSettings`] cell and refreshed by the
//!   scheduler on every tick.
//!
//! ```rust
//! use nimbus_config::Settings;
//!
//! let settings = Settings::default();
//! assert_eq!(settings.pool.max_pool_size, 3);
//! assert_eq!(settings.validation.max_file_bytes, 1024 * 1024);
//! ```

mod dynamic;
mod error;
mod loader;
mod settings;

pub use dynamic::{DynamicSettings, LiveSettings};
pub use error::ConfigError;
pub use loader::{ENV_PREFIX, SettingsLoader};
pub use settings::{
    ExecutionSettings, ExecutorSettings, LoaderSettings, PoolSettings, SchedulerSettings,
    Settings, ValidationSettings,
};

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
