//! Scheduling error types.

use nimbus_core::IntervalUnit;
use nimbus_ports::PortsError;

/// Reasons a schedule cannot run. Each one deactivates the schedule; none
/// stops the loop.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    /// The cron expression does not parse.
    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidCron {
        /// Expression as stored.
        expression: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The interval is zero or overflows.
    #[error("invalid interval: every {every} {unit}")]
    InvalidInterval {
        /// Multiplier.
        every: u32,
        /// Unit.
        unit: IntervalUnit,
    },

    /// The configured timezone is not a known IANA name.
    #[error("unknown timezone `{0}`")]
    InvalidTimezone(String),

    /// The expression never matches within the search window.
    #[error("cron expression `{0}` has no upcoming run")]
    NoUpcomingRun(String),

    /// The target function is not registered.
    #[error("function `{0}` is not registered")]
    FunctionNotFound(String),

    /// The schedule store failed.
    #[error("schedule store: {0}")]
    Store(#[from] PortsError),
}

impl SchedulingError {
    pub(crate) fn cron(expression: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCron {
            expression: expression.to_owned(),
            reason: reason.into(),
        }
    }
}
