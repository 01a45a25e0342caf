//! Metrics primitives and registry.
//!
//! Lightweight in-memory counters, gauges and histograms, keyed by name.
//! No exporter is bundled; callers read values directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;

/// Metric names emitted by the runtime.
pub mod names {
    /// Calls admitted by the engine.
    pub const CALLS_STARTED: &str = "nimbus_calls_started_total";
    /// Calls that finished successfully.
    pub const CALLS_SUCCEEDED: &str = "nimbus_calls_succeeded_total";
    /// Calls that finished with any failure.
    pub const CALLS_FAILED: &str = "nimbus_calls_failed_total";
    /// Calls killed by the wall-clock limit.
    pub const CALLS_TIMED_OUT: &str = "nimbus_calls_timed_out_total";
    /// Call wall-clock duration, in milliseconds.
    pub const CALL_DURATION_MS: &str = "nimbus_call_duration_ms";
    /// Calls that consumed a warm marker.
    pub const POOL_HITS: &str = "nimbus_pool_hits_total";
    /// Calls that found no usable warm marker.
    pub const POOL_MISSES: &str = "nimbus_pool_misses_total";
    /// Functions currently registered.
    pub const FUNCTIONS_REGISTERED: &str = "nimbus_functions_registered";
    /// Scheduler ticks completed.
    pub const SCHEDULER_TICKS: &str = "nimbus_scheduler_ticks_total";
    /// Schedules executed by the scheduler.
    pub const SCHEDULES_EXECUTED: &str = "nimbus_schedules_executed_total";
    /// Schedules turned off by the scheduler.
    pub const SCHEDULES_DEACTIVATED: &str = "nimbus_schedules_deactivated_total";
}

/// An incrementing counter.
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Create a new counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by a given amount.
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge that can go up and down.
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    value: Arc<AtomicI64>,
}

impl Gauge {
    /// Create a new gauge starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement by one.
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Set to a specific value.
    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Upper bounds of the histogram buckets, in the observed unit.
const BUCKETS: [u64; 12] = [5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

/// Fixed-bucket histogram for integer observations such as milliseconds.
///
/// The last slot counts observations above the largest bound.
#[derive(Debug, Clone)]
pub struct Histogram {
    inner: Arc<HistogramInner>,
}

#[derive(Debug)]
struct HistogramInner {
    buckets: [AtomicU64; BUCKETS.len() + 1],
    count: AtomicU64,
    sum: AtomicU64,
}

impl Histogram {
    /// Create an empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HistogramInner {
                buckets: std::array::from_fn(|_| AtomicU64::new(0)),
                count: AtomicU64::new(0),
                sum: AtomicU64::new(0),
            }),
        }
    }

    /// Record an observation.
    pub fn observe(&self, value: u64) {
        let slot = BUCKETS
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(BUCKETS.len());
        self.inner.buckets[slot].fetch_add(1, Ordering::Relaxed);
        self.inner.count.fetch_add(1, Ordering::Relaxed);
        self.inner.sum.fetch_add(value, Ordering::Relaxed);
    }

    /// Number of observations recorded.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.inner.count.load(Ordering::Relaxed)
    }

    /// Sum of all observations.
    #[must_use]
    pub fn sum(&self) -> u64 {
        self.inner.sum.load(Ordering::Relaxed)
    }

    /// `(upper_bound, count)` per bucket; the overflow bucket has bound `None`.
    #[must_use]
    pub fn buckets(&self) -> Vec<(Option<u64>, u64)> {
        self.inner
            .buckets
            .iter()
            .enumerate()
            .map(|(i, c)| (BUCKETS.get(i).copied(), c.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry for creating and retrieving named metrics.
///
/// # Examples
///
/// ```
/// use nimbus_telemetry::metrics::{MetricsRegistry, names};
///
/// let registry = MetricsRegistry::new();
/// registry.counter(names::CALLS_STARTED).inc();
///
/// // Retrieving the same name returns the same metric.
/// assert_eq!(registry.counter(names::CALLS_STARTED).get(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<DashMap<String, Counter>>,
    gauges: Arc<DashMap<String, Gauge>>,
    histograms: Arc<DashMap<String, Histogram>>,
}

impl MetricsRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a counter by name.
    pub fn counter(&self, name: &str) -> Counter {
        self.counters.entry(name.to_owned()).or_default().clone()
    }

    /// Get or create a gauge by name.
    pub fn gauge(&self, name: &str) -> Gauge {
        self.gauges.entry(name.to_owned()).or_default().clone()
    }

    /// Get or create a histogram by name.
    pub fn histogram(&self, name: &str) -> Histogram {
        self.histograms.entry(name.to_owned()).or_default().clone()
    }

    /// Current value of every counter, sorted by name.
    #[must_use]
    pub fn counter_snapshot(&self) -> Vec<(String, u64)> {
        let mut out: Vec<_> = self
            .counters
            .iter()
            .map(|e| (e.key().clone(), e.value().get()))
            .collect();
        out.sort();
        out
    }
}
