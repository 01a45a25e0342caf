use std::sync::Arc;

use async_trait::async_trait;
use nimbus_core::FunctionVersion;
use nimbus_ports::{PortsError, VersionStore};
use parking_lot::RwLock;

/// Version rows held in a vector, unique per `(function_name, content_hash)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryVersionStore {
    rows: Arc<RwLock<Vec<FunctionVersion>>>,
}

impl MemoryVersionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn find(
        &self,
        function_name: &str,
        content_hash: &str,
    ) -> Result<Option<FunctionVersion>, PortsError> {
        Ok(self
            .rows
            .read()
            .iter()
            .find(|v| v.function_name == function_name && v.content_hash == content_hash)
            .cloned())
    }

    async fn insert(&self, version: &FunctionVersion) -> Result<(), PortsError> {
        let mut rows = self.rows.write();
        if rows.iter().any(|v| {
            v.function_name == version.function_name && v.content_hash == version.content_hash
        }) {
            return Err(PortsError::already_exists(
                "FunctionVersion",
                format!("{}@{}", version.function_name, version.short_hash()),
            ));
        }
        rows.push(version.clone());
        Ok(())
    }

    async fn list(&self, function_name: &str) -> Result<Vec<FunctionVersion>, PortsError> {
        let mut out: Vec<_> = self
            .rows
            .read()
            .iter()
            .filter(|v| v.function_name == function_name)
            .cloned()
            .collect();
        out.reverse();
        Ok(out)
    }
}
