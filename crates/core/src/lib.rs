//! # Nimbus Core
//!
//! Core types shared by every Nimbus crate.
//!
//! ## Key Components
//!
//! - **Identifiers**: [`FunctionCallId`], [`ScheduleId`], [`VersionId`], [`UserId`]
//! - **Functions**: [`FunctionMeta`] and the [`AuthLevel`] a caller needs to invoke one
//! - **Versions**: [`FunctionVersion`], one row per distinct deployed source
//! - **Schedules**: [`FunctionSchedule`] and its [`ScheduleDescriptor`]
//!
//! ## Usage
//!
//! ```rust
//! use nimbus_core::{FunctionMeta, AuthLevel, ScheduleId};
//!
//! let meta = FunctionMeta::new("double", "/srv/functions/double.ts")
//!     .with_auth(AuthLevel::Public);
//! assert_eq!(meta.pool_key(), "/srv/functions/double.ts");
//!
//! let schedule_id = ScheduleId::v4();
//! assert!(!schedule_id.is_nil());
//! ```

pub mod error;
pub mod function;
pub mod id;
pub mod schedule;
pub mod version;

pub use error::CoreError;
pub use function::{AuthLevel, FunctionMeta};
pub use id::*;
pub use schedule::{FunctionSchedule, IntervalUnit, ScheduleDescriptor};
pub use version::FunctionVersion;

/// Result type used by core parsing helpers.
pub type Result<T> = std::result::Result<T, CoreError>;
