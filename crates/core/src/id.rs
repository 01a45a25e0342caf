//! Unique identifiers for Nimbus entities.
//!
//! Strongly-typed UUID identifiers built with
//! [`domain-key`](https://crates.io/crates/domain-key) `Uuid<D>` wrappers.
//! Each identifier is parameterized by its own domain marker so a
//! [`ScheduleId`] can never be passed where a [`FunctionCallId`] is expected.
//!
//! All ID types are `Copy` and support `v4()`, `nil()`, `parse(&str)`, serde
//! (as a UUID string), `Display`, `Eq` and `Hash`.

use domain_key::define_uuid;

// Re-export for downstream parse error handling
pub use domain_key::UuidParseError;

define_uuid!(pub FunctionCallIdDomain => FunctionCallId);
define_uuid!(pub ScheduleIdDomain => ScheduleId);
define_uuid!(pub VersionIdDomain => VersionId);
define_uuid!(pub UserIdDomain => UserId);
