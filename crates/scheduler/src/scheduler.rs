//! The scheduler loop.
//!
//! One task sleeps for the configured interval and then runs [`Scheduler::tick`].
//! Due schedules are processed one after another in store order; a failure in
//! one schedule deactivates that schedule and never stops the loop.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use nimbus_config::{LiveSettings, SchedulerSettings};
use nimbus_core::{FunctionSchedule, ScheduleId};
use nimbus_execution::{CallStatus, Invocation};
use nimbus_ports::{ScheduleStore, SettingsStore, TokenIssuer};
use nimbus_runtime::ExecutionEngine;
use nimbus_telemetry::{CallEvent, names};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SchedulingError;
use crate::timetable::Timetable;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Schedules found due.
    pub due: usize,
    /// Schedules whose function was executed.
    pub executed: usize,
    /// Executions that ended `succeeded`.
    pub succeeded: usize,
    /// Executions that ended `failed` or could not be recorded.
    pub failed: usize,
    /// Schedules turned off during this tick.
    pub deactivated: usize,
    /// Tokens removed, when this tick ran the purge.
    pub tokens_purged: Option<usize>,
}

struct LoopTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Polls the schedule store and fires due schedules through the engine.
pub struct Scheduler {
    engine: Arc<ExecutionEngine>,
    schedules: Arc<dyn ScheduleStore>,
    tokens: Arc<dyn TokenIssuer>,
    settings: Arc<dyn SettingsStore>,
    live: LiveSettings,
    timetable: Timetable,
    interval: Duration,
    ticks: AtomicU64,
    task: Mutex<Option<LoopTask>>,
}

impl Scheduler {
    /// Create a stopped scheduler ticking every 60 seconds.
    pub fn new(
        engine: Arc<ExecutionEngine>,
        schedules: Arc<dyn ScheduleStore>,
        tokens: Arc<dyn TokenIssuer>,
        settings: Arc<dyn SettingsStore>,
        live: LiveSettings,
        timetable: Timetable,
    ) -> Self {
        Self {
            engine,
            schedules,
            tokens,
            settings,
            live,
            timetable,
            interval: SchedulerSettings::default().interval(),
            ticks: AtomicU64::new(0),
            task: Mutex::new(None),
        }
    }

    /// Set the sleep between ticks.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sleep between ticks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// The timetable next runs are computed with.
    #[must_use]
    pub const fn timetable(&self) -> &Timetable {
        &self.timetable
    }

    /// Ticks run so far.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Compute the first run of `schedule` and persist it.
    ///
    /// An invalid descriptor is still saved, inactive, and the reason returned.
    pub async fn add(&self, mut schedule: FunctionSchedule) -> Result<FunctionSchedule, SchedulingError> {
        let initialized = self.timetable.initialize_schedule(&mut schedule, Utc::now());
        self.schedules.save(&schedule).await?;
        initialized?;
        tracing::info!(
            schedule_id = %schedule.id,
            function = %schedule.function_name,
            descriptor = %schedule.descriptor,
            next_run_at = ?schedule.next_run_at,
            "schedule added"
        );
        Ok(schedule)
    }

    /// Spawn the loop. Does nothing if it is already running.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.task.lock();
        if slot.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let scheduler: Weak<Self> = Arc::downgrade(self);
        let period = self.interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(period) => {
                        let Some(scheduler) = scheduler.upgrade() else { break };
                        if let Err(e) = scheduler.tick(Utc::now()).await {
                            tracing::error!(error = %e, "scheduler tick failed");
                        }
                    }
                }
            }
        });
        *slot = Some(LoopTask { cancel, handle });
        tracing::info!(interval = ?period, timezone = %self.timetable.timezone(), "scheduler started");
    }

    /// Cancel the loop and wait for it. A tick in progress runs to
    /// completion first; cancellation is only observed between ticks.
    pub async fn stop(&self) {
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                tracing::warn!(error = %e, "scheduler task failed");
            }
            tracing::info!("scheduler stopped");
        }
    }

    /// Whether the loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Run one iteration at `now`.
    ///
    /// `Err` only when the due schedules cannot be fetched; per-schedule
    /// problems are logged and reflected in the report.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport, SchedulingError> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let metrics = self.engine.metrics();
        metrics.counter(names::SCHEDULER_TICKS).inc();

        self.refresh_settings().await;

        let due = self.schedules.due(now).await?;
        let mut report = TickReport {
            due: due.len(),
            ..TickReport::default()
        };
        if !due.is_empty() {
            tracing::debug!(tick, due = due.len(), "processing due schedules");
        }

        for schedule in due {
            self.process(schedule, now, &mut report).await;
        }

        let every = self.live.current().token_cleanup_interval_ticks;
        if every > 0 && tick % u64::from(every) == 0 {
            match self.tokens.purge_expired().await {
                Ok(purged) => {
                    tracing::debug!(purged, "expired tokens purged");
                    report.tokens_purged = Some(purged);
                }
                Err(e) => tracing::warn!(error = %e, "token purge failed"),
            }
        }

        Ok(report)
    }

    async fn refresh_settings(&self) {
        match self.settings.load_dynamic().await {
            Ok(next) => {
                if self.live.replace(next) {
                    tracing::info!(settings = ?self.live.current(), "dynamic settings changed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not refresh dynamic settings"),
        }
    }

    async fn process(&self, schedule: FunctionSchedule, now: DateTime<Utc>, report: &mut TickReport) {
        let Some(meta) = self.engine.registry().get(&schedule.function_name) else {
            let reason = SchedulingError::FunctionNotFound(schedule.function_name.clone());
            self.deactivate(&schedule, &reason, report);
            self.record(schedule.id, None, None).await;
            return;
        };

        let invocation = Invocation::scheduled(schedule.id);
        match self
            .engine
            .execute(&meta, schedule.input.clone(), &invocation)
            .await
        {
            Ok(call) => {
                report.executed += 1;
                if call.status == CallStatus::Succeeded {
                    report.succeeded += 1;
                } else {
                    report.failed += 1;
                }
                tracing::info!(
                    schedule_id = %schedule.id,
                    function = %schedule.function_name,
                    call_id = %call.id,
                    status = ?call.status,
                    "scheduled run finished"
                );
            }
            Err(e) => {
                report.executed += 1;
                report.failed += 1;
                tracing::error!(
                    schedule_id = %schedule.id,
                    function = %schedule.function_name,
                    error = %e,
                    "scheduled run could not be recorded"
                );
            }
        }
        self.engine.metrics().counter(names::SCHEDULES_EXECUTED).inc();

        // The row may have been edited or removed while the function ran.
        let current = match self.schedules.get(schedule.id).await {
            Ok(Some(current)) => current,
            Ok(None) => {
                tracing::debug!(schedule_id = %schedule.id, "schedule removed during its run");
                return;
            }
            Err(e) => {
                tracing::warn!(schedule_id = %schedule.id, error = %e, "could not re-read schedule, using the fetched row");
                schedule
            }
        };

        let next = if current.active {
            match self.timetable.next_run(&current.descriptor, now) {
                Ok(Some(next)) => Some(next),
                Ok(None) => {
                    report.deactivated += 1;
                    self.engine.metrics().counter(names::SCHEDULES_DEACTIVATED).inc();
                    tracing::debug!(schedule_id = %current.id, "one-shot schedule completed");
                    None
                }
                Err(reason) => {
                    self.deactivate(&current, &reason, report);
                    None
                }
            }
        } else {
            None
        };
        self.record(current.id, Some(now), next).await;
    }

    /// Account for and announce a schedule being turned off.
    fn deactivate(&self, schedule: &FunctionSchedule, reason: &SchedulingError, report: &mut TickReport) {
        report.deactivated += 1;
        self.engine.metrics().counter(names::SCHEDULES_DEACTIVATED).inc();
        self.engine.events().emit(CallEvent::ScheduleDeactivated {
            schedule_id: schedule.id,
            reason: reason.to_string(),
        });
        tracing::warn!(
            schedule_id = %schedule.id,
            function = %schedule.function_name,
            reason = %reason,
            "schedule deactivated"
        );
    }

    async fn record(
        &self,
        id: ScheduleId,
        last_run_at: Option<DateTime<Utc>>,
        next_run_at: Option<DateTime<Utc>>,
    ) {
        match self.schedules.record_run(id, last_run_at, next_run_at).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(schedule_id = %id, "schedule removed before its run was recorded"),
            Err(e) => tracing::error!(schedule_id = %id, error = %e, "could not record schedule run"),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel.cancel();
        }
    }
}
