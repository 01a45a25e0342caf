#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Nimbus Telemetry
//!
//! Call lifecycle events and in-process metrics.
//!
//! - [`EventBus`] -- broadcast-based fan-out of [`CallEvent`]s
//! - [`MetricsRegistry`] -- named counters, gauges and duration histograms
//!
//! Events are **projections**. The call store remains the source of truth.

pub mod event;
pub mod metrics;

pub use event::{CallEvent, EventBus, EventSubscriber};
pub use metrics::{Counter, Gauge, Histogram, MetricsRegistry, names};
