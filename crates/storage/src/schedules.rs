use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_core::{FunctionSchedule, ScheduleId};
use nimbus_ports::{PortsError, ScheduleStore};
use parking_lot::RwLock;

/// Schedules held in a map.
#[derive(Debug, Clone, Default)]
pub struct MemoryScheduleStore {
    rows: Arc<RwLock<HashMap<ScheduleId, FunctionSchedule>>>,
}

impl MemoryScheduleStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<FunctionSchedule>, PortsError> {
        let mut due: Vec<_> = self
            .rows
            .read()
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|s| (s.next_run_at, s.created_at));
        Ok(due)
    }

    async fn save(&self, schedule: &FunctionSchedule) -> Result<(), PortsError> {
        self.rows.write().insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn record_run(
        &self,
        id: ScheduleId,
        last_run_at: Option<DateTime<Utc>>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<bool, PortsError> {
        let mut rows = self.rows.write();
        let Some(row) = rows.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(at) = last_run_at {
            row.last_run_at = Some(at);
        }
        match next_run_at {
            Some(next) if row.active => row.next_run_at = Some(next),
            _ => row.deactivate(),
        }
        Ok(true)
    }

    async fn get(&self, id: ScheduleId) -> Result<Option<FunctionSchedule>, PortsError> {
        Ok(self.rows.read().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<FunctionSchedule>, PortsError> {
        let mut all: Vec<_> = self.rows.read().values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        Ok(all)
    }

    async fn delete(&self, id: ScheduleId) -> Result<bool, PortsError> {
        Ok(self.rows.write().remove(&id).is_some())
    }
}
