//! Wiring of the runtime from settings, backed by the in-memory stores.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use nimbus_config::{LiveSettings, Settings};
use nimbus_runtime::{ExecutionEngine, ExecutionLimits, FunctionLoader, FunctionRegistry, WarmPool};
use nimbus_sandbox::ProcessExecutor;
use nimbus_scheduler::{Scheduler, Timetable};
use nimbus_storage::{
    MemoryCallStore, MemoryScheduleStore, MemorySettingsStore, MemoryTokenIssuer,
    MemoryVersionStore,
};
use nimbus_telemetry::{EventBus, MetricsRegistry};

pub struct Host {
    pub registry: Arc<FunctionRegistry>,
    pub pool: Arc<WarmPool>,
    pub loader: Arc<FunctionLoader>,
    pub engine: Arc<ExecutionEngine>,
    pub scheduler: Arc<Scheduler>,
}

impl Host {
    pub fn build(settings: &Settings) -> anyhow::Result<Self> {
        let registry = Arc::new(FunctionRegistry::new());
        let pool = Arc::new(WarmPool::from_settings(&settings.pool));
        let executor = Arc::new(ProcessExecutor::from_settings(&settings.executor));
        let events = Arc::new(EventBus::default());
        let metrics = Arc::new(MetricsRegistry::new());

        let calls = MemoryCallStore::new();
        let tokens = MemoryTokenIssuer::new();
        let settings_store = MemorySettingsStore::default();
        let live = LiveSettings::default();

        let mut loader = FunctionLoader::new(
            Arc::clone(&registry),
            Arc::clone(&pool),
            executor.clone(),
            &settings.loader,
        )
        .with_telemetry(Arc::clone(&events), Arc::clone(&metrics));
        if settings.loader.track_versions {
            loader = loader.with_versions(Arc::new(MemoryVersionStore::new()));
        }

        let engine = Arc::new(
            ExecutionEngine::new(
                Arc::clone(&registry),
                Arc::clone(&pool),
                executor,
                Arc::new(calls),
                Arc::new(tokens.clone()),
            )
            .with_limits(ExecutionLimits::from_settings(settings))
            .with_api_base_url(settings.execution.api_base_url.clone())
            .with_live_settings(live.clone())
            .with_telemetry(events, metrics),
        );

        let timetable = Timetable::from_name(&settings.scheduler.timezone)
            .context("invalid scheduler.timezone")?;
        let scheduler = Arc::new(
            Scheduler::new(
                Arc::clone(&engine),
                Arc::new(MemoryScheduleStore::new()),
                Arc::new(tokens),
                Arc::new(settings_store),
                live,
                timetable,
            )
            .with_interval(settings.scheduler.interval()),
        );

        Ok(Self {
            registry,
            pool,
            loader: Arc::new(loader),
            engine,
            scheduler,
        })
    }

    /// Load every eligible file and wait for pre-warming to settle.
    pub async fn load(&self, dir: &std::path::Path) -> anyhow::Result<usize> {
        let loaded = self
            .loader
            .load_directory(dir)
            .await
            .with_context(|| format!("failed to load {}", dir.display()))?;
        self.loader.wait_for_prewarm().await;
        Ok(loaded)
    }
}

/// `--dir` if given, else the configured directory.
pub fn functions_dir(settings: &Settings, dir: Option<&PathBuf>) -> PathBuf {
    dir.cloned()
        .unwrap_or_else(|| settings.loader.functions_dir.clone())
}
