//! Dynamic settings port.

use async_trait::async_trait;
use nimbus_config::DynamicSettings;

use crate::error::PortsError;

/// Durable settings an operator can change while the host runs.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Current values.
    async fn load_dynamic(&self) -> Result<DynamicSettings, PortsError>;

    /// Persist new values.
    async fn save_dynamic(&self, settings: &DynamicSettings) -> Result<(), PortsError>;
}
