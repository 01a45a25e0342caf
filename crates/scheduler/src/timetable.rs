//! Next-run computation.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use nimbus_core::{FunctionSchedule, ScheduleDescriptor};

use crate::cron::CronExpression;
use crate::error::SchedulingError;

/// Computes run times for schedule descriptors in one server timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timetable {
    tz: Tz,
}

impl Timetable {
    /// Timetable evaluating cron expressions in `tz`.
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Timetable for an IANA timezone name such as `Europe/Berlin`.
    pub fn from_name(name: &str) -> Result<Self, SchedulingError> {
        name.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|_| SchedulingError::InvalidTimezone(name.to_owned()))
    }

    /// The configured timezone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.tz
    }

    /// Run after one that happened at `now`.
    ///
    /// `Ok(None)` means the schedule is finished: a one-shot has fired.
    pub fn next_run(
        &self,
        descriptor: &ScheduleDescriptor,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, SchedulingError> {
        match descriptor {
            ScheduleDescriptor::Once { .. } => Ok(None),
            ScheduleDescriptor::Interval { every, unit } => {
                let invalid = || SchedulingError::InvalidInterval {
                    every: *every,
                    unit: *unit,
                };
                if *every == 0 {
                    return Err(invalid());
                }
                let delta = unit.delta(*every).ok_or_else(invalid)?;
                now.checked_add_signed(delta).map(Some).ok_or_else(invalid)
            }
            ScheduleDescriptor::Cron { expression } => self.next_cron(expression, now).map(Some),
        }
    }

    /// First run of a schedule created at `now`.
    ///
    /// A one-shot fires at its `at`, even when that is already past.
    pub fn first_run(
        &self,
        descriptor: &ScheduleDescriptor,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, SchedulingError> {
        match descriptor {
            ScheduleDescriptor::Once { at } => Ok(*at),
            other => self
                .next_run(other, now)?
                .ok_or_else(|| SchedulingError::NoUpcomingRun(other.to_string())),
        }
    }

    /// Set `next_run_at` on a new schedule.
    ///
    /// A schedule created inactive stays inactive with no next run, but its
    /// descriptor is still checked. An invalid descriptor deactivates the
    /// schedule and returns the reason.
    pub fn initialize_schedule(
        &self,
        schedule: &mut FunctionSchedule,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        match self.first_run(&schedule.descriptor, now) {
            Ok(at) => {
                schedule.next_run_at = schedule.active.then_some(at);
                Ok(())
            }
            Err(err) => {
                schedule.deactivate();
                Err(err)
            }
        }
    }

    fn next_cron(&self, expression: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, SchedulingError> {
        let cron = CronExpression::parse(expression)?;
        cron.next_after(&now.with_timezone(&self.tz))
            .map(|next| next.with_timezone(&Utc))
            .ok_or_else(|| SchedulingError::NoUpcomingRun(expression.to_owned()))
    }
}

impl Default for Timetable {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}
