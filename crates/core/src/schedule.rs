//! Schedule model: what to run, when, and with which input.
//!
//! Only the scheduler mutates `next_run_at` and `last_run_at`. An active
//! schedule always carries a `next_run_at`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::ScheduleId;

/// Unit of an interval schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl IntervalUnit {
    /// Length of one unit in seconds.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
            Self::Weeks => 604_800,
        }
    }

    /// `every` units as a time delta, `None` on overflow.
    #[must_use]
    pub fn delta(self, every: u32) -> Option<TimeDelta> {
        i64::from(every)
            .checked_mul(self.seconds())
            .and_then(TimeDelta::try_seconds)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Weeks => "weeks",
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntervalUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Ok(Self::Seconds),
            "m" | "min" | "minute" | "minutes" => Ok(Self::Minutes),
            "h" | "hour" | "hours" => Ok(Self::Hours),
            "d" | "day" | "days" => Ok(Self::Days),
            "w" | "week" | "weeks" => Ok(Self::Weeks),
            other => Err(CoreError::UnknownIntervalUnit(other.to_owned())),
        }
    }
}

/// When a schedule fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleDescriptor {
    /// Fire once at `at`, then deactivate.
    Once { at: DateTime<Utc> },
    /// Fire every `every` × `unit`.
    Interval { every: u32, unit: IntervalUnit },
    /// Five-field cron expression, evaluated in the server timezone.
    Cron { expression: String },
}

impl ScheduleDescriptor {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Once { .. } => "once",
            Self::Interval { .. } => "interval",
            Self::Cron { .. } => "cron",
        }
    }
}

impl fmt::Display for ScheduleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Once { at } => write!(f, "once at {}", at.to_rfc3339()),
            Self::Interval { every, unit } => write!(f, "every {every} {unit}"),
            Self::Cron { expression } => write!(f, "cron '{expression}'"),
        }
    }
}

/// A persisted timetable entry targeting one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchedule {
    pub id: ScheduleId,
    /// Human-readable label.
    pub name: String,
    /// Registry name of the function to run.
    pub function_name: String,
    pub descriptor: ScheduleDescriptor,
    /// Payload passed to every run.
    #[serde(default)]
    pub input: serde_json::Value,
    pub active: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FunctionSchedule {
    /// New active schedule with no run times computed yet.
    pub fn new(
        name: impl Into<String>,
        function_name: impl Into<String>,
        descriptor: ScheduleDescriptor,
    ) -> Self {
        Self {
            id: ScheduleId::v4(),
            name: name.into(),
            function_name: function_name.into(),
            descriptor,
            input: serde_json::Value::Null,
            active: true,
            next_run_at: None,
            last_run_at: None,
            created_at: Utc::now(),
        }
    }

    /// Set the input payload.
    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }

    /// Active and `next_run_at <= now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && self.next_run_at.is_some_and(|next| next <= now)
    }

    /// Mark inactive and clear the next run.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.next_run_at = None;
    }
}
