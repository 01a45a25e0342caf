//! Call history port.

use async_trait::async_trait;
use nimbus_core::FunctionCallId;
use nimbus_execution::FunctionCall;

use crate::error::PortsError;

/// Durable call history.
///
/// The engine inserts each row once while it is `running` and updates it once
/// when it finishes.
#[async_trait]
pub trait CallStore: Send + Sync {
    /// Insert a new row. Fails with [`PortsError::AlreadyExists`] on id reuse.
    async fn insert(&self, call: &FunctionCall) -> Result<(), PortsError>;

    /// Overwrite an existing row. Fails with [`PortsError::NotFound`] if absent.
    async fn update(&self, call: &FunctionCall) -> Result<(), PortsError>;

    /// Fetch one row.
    async fn get(&self, id: FunctionCallId) -> Result<Option<FunctionCall>, PortsError>;

    /// Most recent rows for a function, newest first.
    async fn list_for_function(
        &self,
        function_name: &str,
        limit: usize,
    ) -> Result<Vec<FunctionCall>, PortsError>;
}
