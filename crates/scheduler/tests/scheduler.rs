use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use nimbus_config::{DynamicSettings, LiveSettings};
use nimbus_core::{AuthLevel, FunctionMeta, FunctionSchedule, IntervalUnit, ScheduleDescriptor};
use nimbus_execution::{CallStatus, Trigger};
use nimbus_ports::{ScheduleStore, SettingsStore, TokenIssuer};
use nimbus_runtime::{ExecutionEngine, FunctionRegistry, WarmPool};
use nimbus_sandbox::{
    ChildReport, InvocationEnvelope, IsolatedExecutor, MetadataReport, RunOutcome, SandboxError,
};
use nimbus_scheduler::{Scheduler, SchedulingError, TickReport, Timetable};
use nimbus_storage::{MemoryCallStore, MemoryScheduleStore, MemorySettingsStore, MemoryTokenIssuer};
use nimbus_telemetry::{CallEvent, names};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;

/// Doubles `payload.value`; the function `explode` reports a failure.
///
/// The functions `retune` and `vanish` edit or delete their own schedules
/// while they run, the way an admin change can land mid-run.
struct Worker {
    seen: Mutex<Vec<InvocationEnvelope>>,
    schedules: MemoryScheduleStore,
}

#[async_trait]
impl IsolatedExecutor for Worker {
    async fn extract_metadata(&self, file: &Path, _timeout: Duration) -> Result<MetadataReport, SandboxError> {
        Err(SandboxError::InvalidOutput {
            detail: format!("not used for {}", file.display()),
            stderr: String::new(),
        })
    }

    async fn sync_dependencies(&self, _file: &Path, _timeout: Duration) -> Result<(), SandboxError> {
        Ok(())
    }

    async fn run(
        &self,
        _file: &Path,
        envelope: &InvocationEnvelope,
        _timeout: Duration,
    ) -> Result<RunOutcome, SandboxError> {
        self.seen.lock().push(envelope.clone());
        if envelope.context.function_name == "explode" {
            return Ok(RunOutcome::Reported(ChildReport::Failed {
                error: "boom".into(),
                error_type: Some("RangeError".into()),
            }));
        }
        let own = |row: &FunctionSchedule| row.function_name == envelope.context.function_name;
        match envelope.context.function_name.as_str() {
            "retune" => {
                for mut row in self.schedules.list().await.unwrap().into_iter().filter(own) {
                    row.active = false;
                    row.next_run_at = None;
                    row.input = json!({"value": 99});
                    self.schedules.save(&row).await.unwrap();
                }
            }
            "vanish" => {
                for row in self.schedules.list().await.unwrap().into_iter().filter(own) {
                    self.schedules.delete(row.id).await.unwrap();
                }
            }
            _ => {}
        }
        let value = envelope.payload["value"].as_i64().unwrap_or_default();
        Ok(RunOutcome::Reported(ChildReport::Succeeded {
            result: json!({ "value": value * 2 }),
        }))
    }
}

struct Fixture {
    scheduler: Arc<Scheduler>,
    engine: Arc<ExecutionEngine>,
    worker: Arc<Worker>,
    schedules: MemoryScheduleStore,
    calls: MemoryCallStore,
    tokens: MemoryTokenIssuer,
    settings: MemorySettingsStore,
    live: LiveSettings,
}

impl Fixture {
    fn new() -> Self {
        Self::with_timetable(Timetable::default())
    }

    fn with_timetable(timetable: Timetable) -> Self {
        let registry = Arc::new(FunctionRegistry::new());
        for name in ["double", "explode", "retune", "vanish"] {
            registry.register(
                FunctionMeta::new(name, format!("/fns/{name}.ts")).with_auth(AuthLevel::Authenticated),
            );
        }
        let schedules = MemoryScheduleStore::new();
        let worker = Arc::new(Worker {
            seen: Mutex::default(),
            schedules: schedules.clone(),
        });
        let calls = MemoryCallStore::new();
        let tokens = MemoryTokenIssuer::new();
        let live = LiveSettings::default();
        let engine = Arc::new(
            ExecutionEngine::new(
                registry,
                Arc::new(WarmPool::new(3, None)),
                worker.clone(),
                Arc::new(calls.clone()),
                Arc::new(tokens.clone()),
            )
            .with_live_settings(live.clone()),
        );
        let settings = MemorySettingsStore::default();
        let scheduler = Arc::new(
            Scheduler::new(
                Arc::clone(&engine),
                Arc::new(schedules.clone()),
                Arc::new(tokens.clone()),
                Arc::new(settings.clone()),
                live.clone(),
                timetable,
            )
            .with_interval(Duration::from_secs(10)),
        );
        Self {
            scheduler,
            engine,
            worker,
            schedules,
            calls,
            tokens,
            settings,
            live,
        }
    }

    /// Persist `schedule` as due at `next_run_at`.
    async fn due_at(&self, mut schedule: FunctionSchedule, next_run_at: DateTime<Utc>) -> FunctionSchedule {
        schedule.next_run_at = Some(next_run_at);
        self.schedules.save(&schedule).await.unwrap();
        schedule
    }

    async fn reload(&self, schedule: &FunctionSchedule) -> FunctionSchedule {
        self.schedules.get(schedule.id).await.unwrap().unwrap()
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn every(n: u32, unit: IntervalUnit) -> ScheduleDescriptor {
    ScheduleDescriptor::Interval { every: n, unit }
}

#[tokio::test]
async fn once_schedule_runs_then_deactivates() {
    let fx = Fixture::new();
    let s = fx
        .due_at(
            FunctionSchedule::new("one-shot", "double", ScheduleDescriptor::Once { at: now() })
                .with_input(json!({"value": 21})),
            now(),
        )
        .await;

    let report = fx.scheduler.tick(now()).await.unwrap();
    assert_eq!(
        report,
        TickReport {
            due: 1,
            executed: 1,
            succeeded: 1,
            deactivated: 1,
            ..TickReport::default()
        }
    );

    let stored = fx.reload(&s).await;
    assert!(!stored.active);
    assert_eq!(stored.next_run_at, None);
    assert_eq!(stored.last_run_at, Some(now()));

    let calls = fx.calls.all();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].result, Some(json!({"value": 42})));

    // Nothing left to run.
    let again = fx.scheduler.tick(now() + TimeDelta::minutes(1)).await.unwrap();
    assert_eq!(again.due, 0);
}

#[tokio::test]
async fn interval_schedule_advances_from_now() {
    let fx = Fixture::new();
    let s = fx
        .due_at(
            FunctionSchedule::new("every-5m", "double", every(5, IntervalUnit::Minutes)),
            now() - TimeDelta::minutes(3),
        )
        .await;

    fx.scheduler.tick(now()).await.unwrap();

    let stored = fx.reload(&s).await;
    assert!(stored.active);
    assert_eq!(stored.last_run_at, Some(now()));
    assert_eq!(stored.next_run_at, Some(now() + TimeDelta::minutes(5)));

    let call = &fx.calls.all()[0];
    assert_eq!(call.trigger, Trigger::Schedule);
    assert_eq!(call.trigger_id, Some(s.id.to_string()));

    let envelope = fx.worker.seen.lock()[0].clone();
    assert_eq!(envelope.context.trigger, "schedule");
    assert!(envelope.context.is_admin, "scheduled runs use the system caller");
}

#[tokio::test]
async fn not_yet_due_is_left_alone() {
    let fx = Fixture::new();
    let s = fx
        .due_at(
            FunctionSchedule::new("later", "double", every(1, IntervalUnit::Hours)),
            now() + TimeDelta::seconds(1),
        )
        .await;

    let report = fx.scheduler.tick(now()).await.unwrap();
    assert_eq!(report.due, 0);
    assert_eq!(fx.reload(&s).await, s);
}

#[tokio::test]
async fn cron_schedule_moves_to_next_match() {
    let fx = Fixture::with_timetable(Timetable::from_name("Europe/Berlin").unwrap());
    let s = fx
        .due_at(
            FunctionSchedule::new(
                "morning",
                "double",
                ScheduleDescriptor::Cron {
                    expression: "0 9 * * *".into(),
                },
            ),
            now(),
        )
        .await;

    fx.scheduler.tick(now()).await.unwrap();

    // 09:00 CET on 2026-03-02 is 08:00 UTC.
    let stored = fx.reload(&s).await;
    assert_eq!(
        stored.next_run_at,
        Some(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn edits_made_during_a_run_survive_it() {
    let fx = Fixture::new();
    let s = fx
        .due_at(
            FunctionSchedule::new("tuned", "retune", every(5, IntervalUnit::Minutes))
                .with_input(json!({"value": 1})),
            now(),
        )
        .await;

    let report = fx.scheduler.tick(now()).await.unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.deactivated, 0);

    let stored = fx.reload(&s).await;
    assert!(!stored.active);
    assert_eq!(stored.next_run_at, None);
    assert_eq!(stored.input, json!({"value": 99}));
    assert_eq!(stored.last_run_at, Some(now()));

    let later = fx.scheduler.tick(now() + TimeDelta::hours(1)).await.unwrap();
    assert_eq!(later.due, 0);
}

#[tokio::test]
async fn schedule_deleted_during_a_run_stays_deleted() {
    let fx = Fixture::new();
    let s = fx
        .due_at(
            FunctionSchedule::new("doomed", "vanish", every(1, IntervalUnit::Minutes)),
            now(),
        )
        .await;

    let report = fx.scheduler.tick(now()).await.unwrap();
    assert_eq!(report.executed, 1);
    assert!(fx.schedules.get(s.id).await.unwrap().is_none());
    assert!(fx.schedules.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_function_deactivates_without_running() {
    let fx = Fixture::new();
    let mut events = fx.engine.events().subscribe();
    let s = fx
        .due_at(
            FunctionSchedule::new("orphan", "gone", every(1, IntervalUnit::Minutes)),
            now(),
        )
        .await;

    let report = fx.scheduler.tick(now()).await.unwrap();
    assert_eq!(report.executed, 0);
    assert_eq!(report.deactivated, 1);
    assert!(fx.calls.is_empty());

    let stored = fx.reload(&s).await;
    assert!(!stored.active);
    assert_eq!(stored.next_run_at, None);
    assert_eq!(stored.last_run_at, None);

    let deactivated = events.drain().into_iter().find_map(|e| match e {
        CallEvent::ScheduleDeactivated { schedule_id, reason } => Some((schedule_id, reason)),
        _ => None,
    });
    let (id, reason) = deactivated.unwrap();
    assert_eq!(id, s.id);
    assert!(reason.contains("gone"), "{reason}");
}

#[tokio::test]
async fn bad_cron_runs_once_then_deactivates() {
    let fx = Fixture::new();
    let s = fx
        .due_at(
            FunctionSchedule::new(
                "broken",
                "double",
                ScheduleDescriptor::Cron {
                    expression: "61 * * * *".into(),
                },
            ),
            now(),
        )
        .await;

    let report = fx.scheduler.tick(now()).await.unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(report.deactivated, 1);

    let stored = fx.reload(&s).await;
    assert!(!stored.active);
    assert_eq!(stored.last_run_at, Some(now()));
    assert_eq!(
        fx.engine.metrics().counter(names::SCHEDULES_DEACTIVATED).get(),
        1
    );
}

#[tokio::test]
async fn failed_runs_keep_the_schedule() {
    let fx = Fixture::new();
    let s = fx
        .due_at(
            FunctionSchedule::new("flaky", "explode", every(30, IntervalUnit::Seconds)),
            now(),
        )
        .await;

    let report = fx.scheduler.tick(now()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.deactivated, 0);

    let stored = fx.reload(&s).await;
    assert!(stored.active);
    assert_eq!(stored.next_run_at, Some(now() + TimeDelta::seconds(30)));

    let call = &fx.calls.all()[0];
    assert_eq!(call.status, CallStatus::Failed);
    assert_eq!(call.error_kind.as_ref().map(ToString::to_string).as_deref(), Some("RangeError"));
}

#[tokio::test]
async fn due_schedules_run_in_order() {
    let fx = Fixture::new();
    fx.due_at(
        FunctionSchedule::new("second", "double", every(1, IntervalUnit::Hours))
            .with_input(json!({"value": 2})),
        now() - TimeDelta::minutes(1),
    )
    .await;
    fx.due_at(
        FunctionSchedule::new("first", "double", every(1, IntervalUnit::Hours))
            .with_input(json!({"value": 1})),
        now() - TimeDelta::minutes(5),
    )
    .await;

    let report = fx.scheduler.tick(now()).await.unwrap();
    assert_eq!(report.executed, 2);

    let order: Vec<_> = fx
        .worker
        .seen
        .lock()
        .iter()
        .map(|e| e.payload["value"].clone())
        .collect();
    assert_eq!(order, vec![json!(1), json!(2)]);
    assert_eq!(fx.engine.metrics().counter(names::SCHEDULES_EXECUTED).get(), 2);
}

#[tokio::test]
async fn tokens_are_purged_every_n_ticks() {
    let fx = Fixture::new();
    fx.settings
        .save_dynamic(&DynamicSettings {
            token_cleanup_interval_ticks: 3,
            ..DynamicSettings::default()
        })
        .await
        .unwrap();
    for _ in 0..2 {
        fx.tokens
            .create_internal_token(None, true, Duration::ZERO)
            .await
            .unwrap();
    }

    assert_eq!(fx.scheduler.tick(now()).await.unwrap().tokens_purged, None);
    assert_eq!(fx.scheduler.tick(now()).await.unwrap().tokens_purged, None);
    assert_eq!(fx.scheduler.tick(now()).await.unwrap().tokens_purged, Some(2));
    assert!(fx.tokens.is_empty());
    assert_eq!(fx.scheduler.tick_count(), 3);
    assert_eq!(fx.engine.metrics().counter(names::SCHEDULER_TICKS).get(), 3);
}

#[tokio::test]
async fn zero_cleanup_interval_never_purges() {
    let fx = Fixture::new();
    fx.settings
        .save_dynamic(&DynamicSettings {
            token_cleanup_interval_ticks: 0,
            ..DynamicSettings::default()
        })
        .await
        .unwrap();
    fx.tokens
        .create_internal_token(None, true, Duration::ZERO)
        .await
        .unwrap();

    for _ in 0..5 {
        assert_eq!(fx.scheduler.tick(now()).await.unwrap().tokens_purged, None);
    }
    assert_eq!(fx.tokens.len(), 1);
}

#[tokio::test]
async fn dynamic_settings_reach_the_worker() {
    let fx = Fixture::new();
    fx.settings
        .save_dynamic(&DynamicSettings {
            logging_enabled: false,
            ..DynamicSettings::default()
        })
        .await
        .unwrap();
    fx.due_at(
        FunctionSchedule::new("quiet", "double", every(1, IntervalUnit::Minutes)),
        now(),
    )
    .await;

    fx.scheduler.tick(now()).await.unwrap();

    assert!(!fx.live.current().logging_enabled);
    let envelope = fx.worker.seen.lock()[0].clone();
    assert!(!envelope.context.logging_enabled);
}

#[tokio::test]
async fn add_computes_first_run() {
    let fx = Fixture::new();
    let before = Utc::now();
    let added = fx
        .scheduler
        .add(FunctionSchedule::new("hourly", "double", every(1, IntervalUnit::Hours)))
        .await
        .unwrap();

    let next = added.next_run_at.unwrap();
    assert!(next >= before + TimeDelta::hours(1));
    assert_eq!(fx.reload(&added).await, added);
}

#[tokio::test]
async fn add_keeps_a_paused_schedule_paused() {
    let fx = Fixture::new();
    let mut paused = FunctionSchedule::new("paused", "double", every(1, IntervalUnit::Minutes));
    paused.active = false;

    let added = fx.scheduler.add(paused).await.unwrap();
    assert!(!added.active);
    assert_eq!(added.next_run_at, None);

    let report = fx.scheduler.tick(Utc::now() + TimeDelta::hours(1)).await.unwrap();
    assert_eq!(report.due, 0);
    assert!(fx.calls.is_empty());
}

#[tokio::test]
async fn add_saves_invalid_schedule_inactive() {
    let fx = Fixture::new();
    let schedule = FunctionSchedule::new(
        "bad",
        "double",
        ScheduleDescriptor::Cron {
            expression: "* * *".into(),
        },
    );
    let id = schedule.id;

    let err = fx.scheduler.add(schedule).await.unwrap_err();
    assert!(matches!(err, SchedulingError::InvalidCron { .. }));

    let stored = fx.schedules.get(id).await.unwrap().unwrap();
    assert!(!stored.active);
}

#[tokio::test(start_paused = true)]
async fn loop_ticks_until_stopped() {
    let fx = Fixture::new();
    fx.due_at(
        FunctionSchedule::new("now", "double", every(1, IntervalUnit::Hours)),
        Utc::now() - TimeDelta::seconds(1),
    )
    .await;

    fx.scheduler.start();
    fx.scheduler.start();
    assert!(fx.scheduler.is_running());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fx.scheduler.tick_count(), 0);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(fx.scheduler.tick_count(), 1);
    assert_eq!(fx.calls.len(), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(fx.scheduler.tick_count(), 2);
    assert_eq!(fx.calls.len(), 1, "next run is an hour away");

    fx.scheduler.stop().await;
    assert!(!fx.scheduler.is_running());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fx.scheduler.tick_count(), 2);
}
