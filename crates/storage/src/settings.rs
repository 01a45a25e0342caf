use std::sync::Arc;

use async_trait::async_trait;
use nimbus_config::DynamicSettings;
use nimbus_ports::{PortsError, SettingsStore};
use parking_lot::RwLock;

/// Dynamic settings held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    current: Arc<RwLock<DynamicSettings>>,
}

impl MemorySettingsStore {
    /// Store seeded with `initial`.
    #[must_use]
    pub fn new(initial: DynamicSettings) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load_dynamic(&self) -> Result<DynamicSettings, PortsError> {
        Ok(self.current.read().clone())
    }

    async fn save_dynamic(&self, settings: &DynamicSettings) -> Result<(), PortsError> {
        *self.current.write() = settings.clone();
        Ok(())
    }
}
