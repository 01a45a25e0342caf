//! Schedule persistence port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nimbus_core::{FunctionSchedule, ScheduleId};

use crate::error::PortsError;

/// Durable schedules.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Active schedules with `next_run_at <= now`, earliest first.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<FunctionSchedule>, PortsError>;

    /// Insert or replace a schedule.
    async fn save(&self, schedule: &FunctionSchedule) -> Result<(), PortsError>;

    /// Record the bookkeeping of one run without touching any other field.
    ///
    /// `last_run_at` is written only when `Some`. `next_run_at == None`
    /// deactivates the row; an inactive row stays inactive whatever
    /// `next_run_at` says. Returns `false` if the row no longer exists.
    async fn record_run(
        &self,
        id: ScheduleId,
        last_run_at: Option<DateTime<Utc>>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<bool, PortsError>;

    /// Fetch one schedule.
    async fn get(&self, id: ScheduleId) -> Result<Option<FunctionSchedule>, PortsError>;

    /// Every schedule, active or not.
    async fn list(&self) -> Result<Vec<FunctionSchedule>, PortsError>;

    /// Remove a schedule. Returns `true` if it existed.
    async fn delete(&self, id: ScheduleId) -> Result<bool, PortsError>;
}
