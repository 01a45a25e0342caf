#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nimbus Ports
//!
//! Collaborator interface traits (ports) for the Nimbus function runtime.
//!
//! The runtime never talks to a database, an auth service or a settings table
//! directly. It goes through these traits, injected at construction:
//!
//! - [`CallStore`] -- call history rows
//! - [`ScheduleStore`] -- schedules and their run times
//! - [`VersionStore`] -- content-addressed function versions
//! - [`TokenIssuer`] -- short-lived internal API tokens
//! - [`SettingsStore`] -- durable, hot-reloadable dynamic settings
//!
//! All traits are `async_trait` and object-safe, suitable for use as
//! `Arc<dyn Trait>`. In-memory drivers live in `nimbus-storage`.

pub mod calls;
pub mod error;
pub mod schedules;
pub mod settings;
pub mod tokens;
pub mod versions;

pub use calls::CallStore;
pub use error::PortsError;
pub use schedules::ScheduleStore;
pub use settings::SettingsStore;
pub use tokens::TokenIssuer;
pub use versions::VersionStore;
