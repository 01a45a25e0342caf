//! Directory loading, hot reload and background pre-warm.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use nimbus_config::LoaderSettings;
use nimbus_core::FunctionMeta;
use nimbus_ports::VersionStore;
use nimbus_sandbox::{IsolatedExecutor, SandboxError};
use nimbus_telemetry::{CallEvent, EventBus, MetricsRegistry, names};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::error::LoaderError;
use crate::registry::FunctionRegistry;
use crate::warm_pool::WarmPool;

/// Extension of loadable function files.
pub const FUNCTION_EXTENSION: &str = "ts";

/// `.ts` files whose name starts with neither `_` nor `.`.
pub fn is_eligible(path: &Path) -> bool {
    let has_ext = path
        .extension()
        .is_some_and(|ext| ext == FUNCTION_EXTENSION);
    let visible = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| !n.starts_with('_') && !n.starts_with('.'));
    has_ext && visible
}

/// Canonical form of `path`, resolved through its parent so deleted files
/// still normalize.
async fn normalize(path: &Path) -> PathBuf {
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(parent) = tokio::fs::canonicalize(parent).await {
            return parent.join(name);
        }
    }
    path.to_path_buf()
}

/// Populates the registry from function files.
///
/// Metadata extraction runs in the isolated executor, never in-process.
/// After a file is registered its dependencies are synced in the
/// background and a warm marker is added to the pool.
pub struct FunctionLoader {
    registry: Arc<FunctionRegistry>,
    pool: Arc<WarmPool>,
    executor: Arc<dyn IsolatedExecutor>,
    versions: Option<Arc<dyn VersionStore>>,
    events: Arc<EventBus>,
    metrics: Arc<MetricsRegistry>,
    concurrency: usize,
    metadata_timeout: Duration,
    sync_timeout: Duration,
    prewarm: TaskTracker,
}

impl FunctionLoader {
    /// Create a loader with the given components.
    pub fn new(
        registry: Arc<FunctionRegistry>,
        pool: Arc<WarmPool>,
        executor: Arc<dyn IsolatedExecutor>,
        settings: &LoaderSettings,
    ) -> Self {
        Self {
            registry,
            pool,
            executor,
            versions: None,
            events: Arc::new(EventBus::default()),
            metrics: Arc::new(MetricsRegistry::new()),
            concurrency: settings.concurrency.max(1),
            metadata_timeout: settings.metadata_timeout(),
            sync_timeout: settings.sync_timeout(),
            prewarm: TaskTracker::new(),
        }
    }

    /// Record a version row for every loaded file.
    pub fn with_versions(mut self, store: Arc<dyn VersionStore>) -> Self {
        self.versions = Some(store);
        self
    }

    /// Share the engine's event bus and metrics.
    pub fn with_telemetry(mut self, events: Arc<EventBus>, metrics: Arc<MetricsRegistry>) -> Self {
        self.events = events;
        self.metrics = metrics;
        self
    }

    /// Access the registry this loader populates.
    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Eligible files directly inside `dir`, sorted.
    pub async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
        let io_err = |source| LoaderError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let dir = tokio::fs::canonicalize(dir).await.map_err(io_err)?;
        let mut reader = tokio::fs::read_dir(&dir).await.map_err(io_err)?;

        let mut files = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
            if is_file && is_eligible(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Load every eligible file in `dir`. Returns how many were registered.
    ///
    /// Per-file failures are logged and skipped. Pre-warm runs in the
    /// background; see [`FunctionLoader::wait_for_prewarm`].
    pub async fn load_directory(&self, dir: &Path) -> Result<usize, LoaderError> {
        let files = Self::list_files(dir).await?;
        tracing::info!(dir = %dir.display(), files = files.len(), "loading functions");

        let results: Vec<_> = futures::stream::iter(files)
            .map(|path| async move {
                let result = self.load_file(&path).await;
                (path, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut loaded = 0;
        for (path, result) in results {
            match result {
                Ok(meta) => {
                    let meta = self.install(meta);
                    self.spawn_prewarm(&meta);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping function file");
                }
            }
        }
        tracing::info!(loaded, "functions loaded");
        Ok(loaded)
    }

    /// Re-extract one file and replace whatever it registered before.
    pub async fn reload_single(&self, path: &Path) -> Result<Arc<FunctionMeta>, LoaderError> {
        if !is_eligible(path) {
            return Err(LoaderError::NotEligible(path.to_path_buf()));
        }
        let path = normalize(path).await;
        let meta = self.load_file(&path).await?;

        if let Some(old) = self.registry.find_by_path(&path)
            && old.name != meta.name
        {
            tracing::info!(old = %old.name, new = %meta.name, "function renamed");
            self.unregister(&old.name);
        }
        let meta = self.install(meta);
        self.spawn_prewarm(&meta);
        Ok(meta)
    }

    /// Unregister the function backed by a deleted file.
    pub async fn remove_path(&self, path: &Path) -> Option<Arc<FunctionMeta>> {
        let path = normalize(path).await;
        let meta = self.registry.find_by_path(&path)?;
        self.unregister(&meta.name)
    }

    /// Await every pre-warm started so far.
    pub async fn wait_for_prewarm(&self) {
        self.prewarm.close();
        self.prewarm.wait().await;
        self.prewarm.reopen();
    }

    /// Hot-reload `dir`: created or modified files are reloaded, removed
    /// files are unregistered. Stops when the handle is dropped.
    pub async fn watch(self: &Arc<Self>, dir: &Path) -> Result<WatchHandle, LoaderError> {
        let dir = tokio::fs::canonicalize(dir)
            .await
            .map_err(|source| LoaderError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => tracing::error!(error = %e, "function watcher error"),
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %dir.display(), "watching functions");

        let loader = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for path in event.paths.iter().filter(|p| is_eligible(p)) {
                    loader.handle_change(&event.kind, path).await;
                }
            }
        });

        Ok(WatchHandle {
            _watcher: watcher,
            task,
        })
    }

    async fn handle_change(&self, kind: &EventKind, path: &Path) {
        let exists = tokio::fs::try_exists(path).await.unwrap_or(false);
        match kind {
            EventKind::Create(_) | EventKind::Modify(_) if exists => {
                match self.reload_single(path).await {
                    Ok(meta) => tracing::info!(function = %meta.name, "hot reloaded"),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "hot reload failed"),
                }
            }
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                if let Some(meta) = self.remove_path(path).await {
                    tracing::info!(function = %meta.name, "function file removed");
                }
            }
            _ => {}
        }
    }

    async fn load_file(&self, path: &Path) -> Result<FunctionMeta, LoaderError> {
        let report = self
            .executor
            .extract_metadata(path, self.metadata_timeout)
            .await
            .map_err(|source| match source {
                SandboxError::Timeout { after } => LoaderError::Timeout {
                    path: path.to_path_buf(),
                    after,
                },
                source => LoaderError::Metadata {
                    path: path.to_path_buf(),
                    source,
                },
            })?;
        let meta = report.into_meta(path);

        let Some(store) = &self.versions else {
            return Ok(meta);
        };
        let content = tokio::fs::read(path).await.map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let hash = nimbus_validator::content_hash(&content);
        match nimbus_validator::get_or_create_version(
            store.as_ref(),
            &meta.name,
            &hash,
            content.len() as u64,
            None,
            None,
        )
        .await
        {
            Ok((version, _)) => Ok(meta.with_version(version.id)),
            Err(e) => {
                tracing::warn!(function = %meta.name, error = %e, "version tracking failed, loading unversioned");
                Ok(meta)
            }
        }
    }

    fn install(&self, meta: FunctionMeta) -> Arc<FunctionMeta> {
        let meta = Arc::new(meta);
        if let Some(previous) = self.registry.register(Arc::clone(&meta))
            && previous.file_path != meta.file_path
        {
            tracing::warn!(
                function = %meta.name,
                previous = %previous.file_path.display(),
                current = %meta.file_path.display(),
                "function name claimed by another file"
            );
        }
        self.events.emit(CallEvent::FunctionLoaded {
            function: meta.name.clone(),
        });
        self.update_gauge();
        meta
    }

    fn unregister(&self, name: &str) -> Option<Arc<FunctionMeta>> {
        let removed = self.registry.unregister(name)?;
        self.events.emit(CallEvent::FunctionUnloaded {
            function: name.to_owned(),
        });
        self.update_gauge();
        Some(removed)
    }

    fn update_gauge(&self) {
        self.metrics
            .gauge(names::FUNCTIONS_REGISTERED)
            .set(self.registry.len() as i64);
    }

    fn spawn_prewarm(&self, meta: &FunctionMeta) {
        if !self.pool.is_enabled() {
            return;
        }
        let executor = Arc::clone(&self.executor);
        let pool = Arc::clone(&self.pool);
        let path = meta.file_path.clone();
        let key = meta.pool_key();
        let name = meta.name.clone();
        let timeout = self.sync_timeout;
        self.prewarm.spawn(async move {
            match executor.sync_dependencies(&path, timeout).await {
                Ok(()) => pool.prewarm(&key),
                Err(e) => tracing::warn!(function = %name, error = %e, "pre-warm failed"),
            }
        });
    }
}

/// Keeps a directory watch alive. Dropping it stops hot reload.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop watching.
    pub fn stop(self) {}
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
