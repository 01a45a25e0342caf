#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nimbus Execution
//!
//! Call-history model for Nimbus function invocations.
//!
//! This crate models what one invocation looks like once recorded. It does NOT
//! run anything; the engine lives in `nimbus-runtime`. It defines:
//!
//! - [`FunctionCall`] -- the persisted row, inserted once and finished once
//! - [`CallStatus`] -- `running` → `succeeded` | `failed`
//! - [`CallErrorKind`] -- machine-readable failure classification
//! - [`Trigger`], [`Caller`] and [`Invocation`] -- who asked for the run and why
//! - State machine transitions validated by the [`transition`] module

pub mod call;
pub mod error;
pub mod invocation;
pub mod kind;
pub mod status;
pub mod transition;

pub use call::FunctionCall;
pub use error::ExecutionError;
pub use invocation::{Caller, Invocation, Trigger};
pub use kind::CallErrorKind;
pub use status::CallStatus;
