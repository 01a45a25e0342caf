//! Settings that may change while the host runs.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// Durable, operator-editable values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicSettings {
    /// Purge expired tokens once every this many scheduler ticks.
    pub token_cleanup_interval_ticks: u32,
    /// Forwarded to workers as `context.logging_enabled`.
    pub logging_enabled: bool,
}

impl Default for DynamicSettings {
    fn default() -> Self {
        Self {
            token_cleanup_interval_ticks: 60,
            logging_enabled: true,
        }
    }
}

/// Lock-free cell holding the current [`DynamicSettings`].
///
/// Cloning shares the same cell.
#[derive(Debug, Clone)]
pub struct LiveSettings {
    inner: Arc<ArcSwap<DynamicSettings>>,
}

impl LiveSettings {
    /// Cell seeded with `initial`.
    #[must_use]
    pub fn new(initial: DynamicSettings) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<DynamicSettings> {
        self.inner.load_full()
    }

    /// Replace the snapshot. Returns `true` if anything changed.
    pub fn replace(&self, next: DynamicSettings) -> bool {
        let previous = self.inner.swap(Arc::new(next));
        *previous != **self.inner.load()
    }
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self::new(DynamicSettings::default())
    }
}
