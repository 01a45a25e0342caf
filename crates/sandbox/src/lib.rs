#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nimbus Sandbox
//!
//! The boundary between the host and user code. Function files never run
//! in-process: every metadata extraction, dependency sync and invocation
//! happens in a separate worker program that speaks a line-oriented JSON
//! protocol.
//!
//! - [`IsolatedExecutor`] is the seam the runtime depends on.
//! - [`ProcessExecutor`] launches one OS process per request, enforces the
//!   wall-clock limit and kills the whole process group on timeout.
//! - [`protocol`] holds the wire types.

mod error;
mod executor;
mod process;
pub mod protocol;

pub use error::SandboxError;
pub use executor::{IsolatedExecutor, RunOutcome};
pub use process::ProcessExecutor;
pub use protocol::{ChildReport, InvocationContext, InvocationEnvelope, MetadataReport};

/// Flag passed to the worker to request metadata.
pub const METADATA_FLAG: &str = "--metadata";

/// Flag passed to the worker to resolve dependencies.
pub const SYNC_FLAG: &str = "--sync";
