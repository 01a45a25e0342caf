//! Function version port.

use async_trait::async_trait;
use nimbus_core::FunctionVersion;

use crate::error::PortsError;

/// Content-addressed version rows, unique per `(function_name, content_hash)`.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Look up the row for a name and hash.
    async fn find(
        &self,
        function_name: &str,
        content_hash: &str,
    ) -> Result<Option<FunctionVersion>, PortsError>;

    /// Insert a new row. Fails with [`PortsError::AlreadyExists`] when the
    /// `(function_name, content_hash)` pair is taken.
    async fn insert(&self, version: &FunctionVersion) -> Result<(), PortsError>;

    /// All versions of a function, newest first.
    async fn list(&self, function_name: &str) -> Result<Vec<FunctionVersion>, PortsError>;
}
