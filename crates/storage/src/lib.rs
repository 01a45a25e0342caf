#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nimbus Storage
//!
//! In-memory implementations of every port in `nimbus-ports`.
//!
//! Suitable for tests, the CLI and single-process deployments where
//! durability is not required. Every store is cheap to clone and clones
//! share state.

mod calls;
mod schedules;
mod settings;
mod tokens;
mod versions;

pub use calls::MemoryCallStore;
pub use schedules::MemoryScheduleStore;
pub use settings::MemorySettingsStore;
pub use tokens::{IssuedToken, MemoryTokenIssuer};
pub use versions::MemoryVersionStore;
