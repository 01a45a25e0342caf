#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nimbus Scheduler
//!
//! Fires registered functions on timetables.
//!
//! - [`CronExpression`] -- five-field cron with lists, ranges, steps, names
//!   and `@daily`-style macros
//! - [`Timetable`] -- next-run computation in the server timezone
//! - [`Scheduler`] -- one cooperative loop polling due schedules and driving
//!   the [`ExecutionEngine`](nimbus_runtime::ExecutionEngine)
//!
//! A due schedule is always advanced strictly past `now` or deactivated, so
//! the same `next_run_at` is never processed twice.

pub mod cron;
pub mod error;
pub mod scheduler;
pub mod timetable;

pub use cron::CronExpression;
pub use error::SchedulingError;
pub use scheduler::{Scheduler, TickReport};
pub use timetable::Timetable;
