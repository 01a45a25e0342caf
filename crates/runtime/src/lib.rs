#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nimbus Runtime
//!
//! Everything between "a directory of function files" and "a finished call
//! row".
//!
//! This crate provides:
//! - [`FunctionRegistry`] -- name to [`FunctionMeta`](nimbus_core::FunctionMeta) catalog
//! - [`WarmPool`] -- bounded, TTL-evicting cache of ready environments
//! - [`FunctionLoader`] -- scans a directory, extracts metadata, pre-warms
//! - [`ExecutionEngine`] -- runs one invocation end to end
//! - [`ExecutionLimits`] -- payload, result and time limits
//!
//! The engine sits between callers (HTTP routes, the scheduler, the CLI)
//! and the sandbox. It never returns `Err` for a failure of user code: such
//! failures are recorded on the returned call row.

pub mod engine;
pub mod error;
pub mod limits;
pub mod loader;
pub mod registry;
pub mod warm_pool;

pub use engine::ExecutionEngine;
pub use error::{LoaderError, RuntimeError};
pub use limits::ExecutionLimits;
pub use loader::{FunctionLoader, WatchHandle};
pub use registry::FunctionRegistry;
pub use warm_pool::{WarmPool, WarmProcess};
