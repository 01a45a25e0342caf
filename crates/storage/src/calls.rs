use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nimbus_core::FunctionCallId;
use nimbus_execution::FunctionCall;
use nimbus_ports::{CallStore, PortsError};
use parking_lot::RwLock;

/// Call history held in a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCallStore {
    rows: Arc<RwLock<HashMap<FunctionCallId, FunctionCall>>>,
}

impl MemoryCallStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, oldest first.
    #[must_use]
    pub fn all(&self) -> Vec<FunctionCall> {
        let mut rows: Vec<_> = self.rows.read().values().cloned().collect();
        rows.sort_by_key(|c| c.started_at);
        rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// `true` when no rows exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl CallStore for MemoryCallStore {
    async fn insert(&self, call: &FunctionCall) -> Result<(), PortsError> {
        let mut rows = self.rows.write();
        if rows.contains_key(&call.id) {
            return Err(PortsError::already_exists("FunctionCall", call.id.to_string()));
        }
        rows.insert(call.id, call.clone());
        Ok(())
    }

    async fn update(&self, call: &FunctionCall) -> Result<(), PortsError> {
        let mut rows = self.rows.write();
        match rows.get_mut(&call.id) {
            Some(row) => {
                *row = call.clone();
                Ok(())
            }
            None => Err(PortsError::not_found("FunctionCall", call.id.to_string())),
        }
    }

    async fn get(&self, id: FunctionCallId) -> Result<Option<FunctionCall>, PortsError> {
        Ok(self.rows.read().get(&id).cloned())
    }

    async fn list_for_function(
        &self,
        function_name: &str,
        limit: usize,
    ) -> Result<Vec<FunctionCall>, PortsError> {
        let mut rows: Vec<_> = self
            .rows
            .read()
            .values()
            .filter(|c| c.function_name == function_name)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        rows.truncate(limit);
        Ok(rows)
    }
}
