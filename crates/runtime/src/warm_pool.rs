//! Per-function cache of ready environments.
//!
//! A marker in the pool means "this file's dependencies were resolved
//! recently", which lets the worker skip the sync step. Keys are function
//! file paths. Each key holds a bounded FIFO; the oldest entry leaves first,
//! both on `get` and on overflow.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use nimbus_config::PoolSettings;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One pooled environment marker.
///
/// Each invocation runs in a fresh worker process, so an entry carries no
/// process handle: it records that the file's dependencies were resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmProcess {
    /// Function file the entry belongs to.
    pub key: String,
    /// Last time the environment was used or returned.
    pub last_used: Instant,
}

impl WarmProcess {
    /// A fresh marker for `key`.
    pub fn marker(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            last_used: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| now.saturating_duration_since(self.last_used) > ttl)
    }
}

struct CleanupTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Bounded, TTL-evicting warm pool.
///
/// One mutex guards every key. All operations are no-ops when
/// `max_size == 0`.
pub struct WarmPool {
    entries: Mutex<HashMap<String, VecDeque<WarmProcess>>>,
    max_size: usize,
    ttl: Option<Duration>,
    cleanup_interval: Duration,
    cleanup: Mutex<Option<CleanupTask>>,
}

impl std::fmt::Debug for WarmPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmPool")
            .field("max_size", &self.max_size)
            .field("ttl", &self.ttl)
            .field("total", &self.total())
            .finish_non_exhaustive()
    }
}

impl WarmPool {
    /// Pool keeping up to `max_size` entries per key, evicting after `ttl`.
    pub fn new(max_size: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size,
            ttl,
            cleanup_interval: PoolSettings::default().cleanup_interval(),
            cleanup: Mutex::new(None),
        }
    }

    /// Pool configured from the `pool` settings section.
    pub fn from_settings(settings: &PoolSettings) -> Self {
        Self::new(settings.max_pool_size, settings.ttl())
            .with_cleanup_interval(settings.cleanup_interval())
    }

    /// Period of the background sweep.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// `false` when `max_size == 0`.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.max_size > 0
    }

    /// Pop the oldest entry for `key`.
    ///
    /// An entry older than the TTL is discarded and `None` returned.
    pub fn get(&self, key: &str) -> Option<WarmProcess> {
        if !self.is_enabled() {
            return None;
        }
        let mut entries = self.entries.lock();
        let queue = entries.get_mut(key)?;
        let entry = queue.pop_front();
        if queue.is_empty() {
            entries.remove(key);
        }
        drop(entries);

        let entry = entry?;
        if entry.is_expired(self.ttl, Instant::now()) {
            tracing::debug!(key, "warm entry expired on get");
            return None;
        }
        Some(entry)
    }

    /// Return an entry, refreshing its `last_used`.
    pub fn put(&self, key: &str, mut warm: WarmProcess) {
        if !self.is_enabled() {
            return;
        }
        warm.last_used = Instant::now();
        warm.key = key.to_owned();
        self.push(key, warm);
    }

    /// Insert a fresh marker for `key`.
    pub fn prewarm(&self, key: &str) {
        if !self.is_enabled() {
            return;
        }
        self.push(key, WarmProcess::marker(key));
        tracing::debug!(key, "pre-warmed");
    }

    fn push(&self, key: &str, warm: WarmProcess) {
        let mut entries = self.entries.lock();
        let queue = entries.entry(key.to_owned()).or_default();
        if queue.len() >= self.max_size {
            queue.pop_front();
        }
        queue.push_back(warm);
    }

    /// Drop every expired entry and empty key. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        if !self.is_enabled() || self.ttl.is_none() {
            return 0;
        }
        let now = Instant::now();
        let mut count = 0;
        {
            let mut entries = self.entries.lock();
            for queue in entries.values_mut() {
                let before = queue.len();
                queue.retain(|w| !w.is_expired(self.ttl, now));
                count += before - queue.len();
            }
            entries.retain(|_, queue| !queue.is_empty());
        }
        if count > 0 {
            tracing::debug!(evicted = count, "warm pool sweep");
        }
        count
    }

    /// Entries held for `key`.
    #[must_use]
    pub fn len(&self, key: &str) -> usize {
        self.entries.lock().get(key).map_or(0, VecDeque::len)
    }

    /// Entries held across every key.
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.lock().values().map(VecDeque::len).sum()
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Start the background sweep. No-op when the pool is disabled, eviction
    /// is disabled, or the sweep is already running.
    pub fn start_cleanup(self: &Arc<Self>) {
        if !self.is_enabled() || self.ttl.is_none() {
            return;
        }
        let mut slot = self.cleanup.lock();
        if slot.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let pool: Weak<Self> = Arc::downgrade(self);
        let period = self.cleanup_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(pool) = pool.upgrade() else { break };
                        pool.sweep();
                    }
                }
            }
        });
        *slot = Some(CleanupTask { cancel, handle });
        tracing::debug!(interval = ?period, "warm pool cleanup started");
    }

    /// Stop the background sweep and wait for it to finish.
    pub async fn stop_cleanup(&self) {
        let task = self.cleanup.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                tracing::warn!(error = %e, "warm pool cleanup task failed");
            }
        }
    }

    /// Whether the background sweep is running.
    #[must_use]
    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup.lock().is_some()
    }
}

impl Drop for WarmPool {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup.get_mut().take() {
            task.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const KEY: &str = "/fns/double.ts";

    fn pool(max: usize, ttl_secs: u64) -> WarmPool {
        WarmPool::new(max, (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)))
    }

    #[tokio::test]
    async fn prewarm_then_get_pops() {
        let pool = pool(3, 300);
        pool.prewarm(KEY);
        assert_eq!(pool.len(KEY), 1);

        let warm = pool.get(KEY).unwrap();
        assert_eq!(warm.key, KEY);
        assert_eq!(pool.len(KEY), 0);
        assert!(pool.get(KEY).is_none());
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let pool = pool(3, 300);
        for _ in 0..5 {
            pool.prewarm(KEY);
        }
        assert_eq!(pool.len(KEY), 3);
        assert_eq!(pool.total(), 3);
    }

    #[tokio::test]
    async fn zero_size_disables_everything() {
        let pool = pool(0, 300);
        pool.prewarm(KEY);
        pool.put(KEY, WarmProcess::marker(KEY));
        assert_eq!(pool.total(), 0);
        assert!(pool.get(KEY).is_none());
        assert!(!pool.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_discarded_on_get() {
        let pool = pool(3, 10);
        pool.prewarm(KEY);
        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(pool.get(KEY).is_none());
        assert_eq!(pool.total(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn put_refreshes_last_used() {
        let pool = pool(3, 10);
        let stale = WarmProcess::marker(KEY);
        tokio::time::advance(Duration::from_secs(60)).await;

        pool.put(KEY, stale);
        assert!(pool.get(KEY).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_expired_and_empty_keys() {
        let pool = pool(3, 10);
        pool.prewarm("/fns/a.ts");
        tokio::time::advance(Duration::from_secs(8)).await;
        pool.prewarm("/fns/b.ts");
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(pool.sweep(), 1);
        assert_eq!(pool.len("/fns/a.ts"), 0);
        assert_eq!(pool.len("/fns/b.ts"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_keeps_fresh_entries_of_the_same_key_in_order() {
        let pool = pool(3, 10);
        pool.prewarm(KEY);
        tokio::time::advance(Duration::from_secs(8)).await;
        pool.put(KEY, WarmProcess::marker(KEY));
        let fresh_at = Instant::now();
        tokio::time::advance(Duration::from_secs(1)).await;
        pool.prewarm(KEY);
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(pool.sweep(), 1);
        assert_eq!(pool.len(KEY), 2);
        assert_eq!(pool.get(KEY).unwrap().last_used, fresh_at);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_never_evicts() {
        let pool = pool(3, 0);
        pool.prewarm(KEY);
        tokio::time::advance(Duration::from_secs(86_400)).await;

        assert_eq!(pool.sweep(), 0);
        assert!(pool.get(KEY).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn background_cleanup_sweeps_and_stops() {
        let pool = Arc::new(
            WarmPool::new(3, Some(Duration::from_secs(10)))
                .with_cleanup_interval(Duration::from_secs(5)),
        );
        pool.prewarm(KEY);
        pool.start_cleanup();
        assert!(pool.is_cleanup_running());

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(pool.total(), 0);

        pool.stop_cleanup().await;
        assert!(!pool.is_cleanup_running());
    }

    #[tokio::test]
    async fn cleanup_is_noop_without_ttl() {
        let pool = Arc::new(pool(3, 0));
        pool.start_cleanup();
        assert!(!pool.is_cleanup_running());
        pool.stop_cleanup().await;
    }

    #[tokio::test]
    async fn clear_empties_every_key() {
        let pool = pool(3, 300);
        pool.prewarm("/fns/a.ts");
        pool.prewarm("/fns/b.ts");
        pool.clear();
        assert_eq!(pool.total(), 0);
    }
}
