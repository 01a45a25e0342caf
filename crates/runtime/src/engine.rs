//! Execution engine -- runs one invocation end to end.
//!
//! Admit, authorize, acquire a warm marker, invoke the worker, enforce
//! limits, record the row, release the marker. Every dispatched invocation
//! produces exactly one call row, inserted as `running` and updated once.

use std::sync::Arc;

use chrono::Utc;
use nimbus_config::LiveSettings;
use nimbus_core::FunctionMeta;
use nimbus_execution::{CallErrorKind, FunctionCall, Invocation};
use nimbus_ports::{CallStore, TokenIssuer};
use nimbus_sandbox::{
    ChildReport, InvocationContext, InvocationEnvelope, IsolatedExecutor, RunOutcome, SandboxError,
};
use nimbus_telemetry::{CallEvent, EventBus, MetricsRegistry, names};
use serde_json::Value;

use crate::error::RuntimeError;
use crate::limits::ExecutionLimits;
use crate::registry::FunctionRegistry;
use crate::warm_pool::{WarmPool, WarmProcess};

/// Error type recorded when the worker reports a failure without one.
const DEFAULT_USER_ERROR: &str = "Error";

/// How the call ended, before it is written to the row.
enum Completion {
    Success(Value),
    Failure(CallErrorKind, String),
}

/// Orchestrates invocations.
///
/// Shared through `Arc` and called concurrently from request handlers and
/// the scheduler. Failures of user code come back as a failed
/// [`FunctionCall`]; `Err` is reserved for faults of the call store.
pub struct ExecutionEngine {
    registry: Arc<FunctionRegistry>,
    pool: Arc<WarmPool>,
    executor: Arc<dyn IsolatedExecutor>,
    calls: Arc<dyn CallStore>,
    tokens: Arc<dyn TokenIssuer>,
    live: LiveSettings,
    limits: ExecutionLimits,
    api_base_url: String,
    events: Arc<EventBus>,
    metrics: Arc<MetricsRegistry>,
}

impl ExecutionEngine {
    /// Create an engine with default limits.
    pub fn new(
        registry: Arc<FunctionRegistry>,
        pool: Arc<WarmPool>,
        executor: Arc<dyn IsolatedExecutor>,
        calls: Arc<dyn CallStore>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            registry,
            pool,
            executor,
            calls,
            tokens,
            live: LiveSettings::default(),
            limits: ExecutionLimits::default(),
            api_base_url: nimbus_config::ExecutionSettings::default().api_base_url,
            events: Arc::new(EventBus::default()),
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Replace the limits.
    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Base URL handed to workers for SDK callbacks.
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Share a dynamic settings cell with the scheduler.
    pub fn with_live_settings(mut self, live: LiveSettings) -> Self {
        self.live = live;
        self
    }

    /// Share an event bus and metrics registry.
    pub fn with_telemetry(mut self, events: Arc<EventBus>, metrics: Arc<MetricsRegistry>) -> Self {
        self.events = events;
        self.metrics = metrics;
        self
    }

    /// Access the function registry.
    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Access the limits.
    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Access the event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Access the metrics registry.
    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Look `name` up in the registry and execute it.
    pub async fn execute_by_name(
        &self,
        name: &str,
        payload: Value,
        invocation: &Invocation,
    ) -> Result<FunctionCall, RuntimeError> {
        let meta = self
            .registry
            .get(name)
            .ok_or_else(|| RuntimeError::FunctionNotFound {
                name: name.to_owned(),
            })?;
        self.execute(&meta, payload, invocation).await
    }

    /// Execute one invocation and return the finished call row.
    ///
    /// # Flow
    ///
    /// 1. Insert the `running` row and check the payload size
    /// 2. Check the caller against the function's auth level and mint an
    ///    internal token
    /// 3. Take a warm marker for the function file, if one is pooled
    /// 4. Run the worker under the wall-clock limit
    /// 5. Map the outcome and check the result size
    /// 6. Update the row once
    /// 7. Return a marker to the pool when the worker completed the protocol
    pub async fn execute(
        &self,
        meta: &FunctionMeta,
        payload: Value,
        invocation: &Invocation,
    ) -> Result<FunctionCall, RuntimeError> {
        let mut call = FunctionCall::start(&meta.name, invocation, meta.version_id);
        self.calls.insert(&call).await?;

        self.metrics.counter(names::CALLS_STARTED).inc();
        self.events.emit(CallEvent::CallStarted {
            call_id: call.id,
            function: meta.name.clone(),
        });
        tracing::debug!(
            call_id = %call.id,
            function = %meta.name,
            trigger = %invocation.trigger,
            "call started"
        );

        let completion = self.dispatch(meta, payload, invocation, &mut call).await;

        let finished_at = Utc::now();
        match completion {
            Completion::Success(result) => call.succeed(result, finished_at)?,
            Completion::Failure(kind, message) => call.fail(kind, message, finished_at)?,
        }
        self.calls.update(&call).await?;
        self.observe(&call);
        Ok(call)
    }

    async fn dispatch(
        &self,
        meta: &FunctionMeta,
        payload: Value,
        invocation: &Invocation,
        call: &mut FunctionCall,
    ) -> Completion {
        // Admit
        let serialized = serde_json::to_vec(&payload).unwrap_or_default();
        if let Err((limit, actual)) = self.limits.check_payload_size(&serialized) {
            return Completion::Failure(
                CallErrorKind::PayloadSize,
                format!("payload is {actual} bytes, limit is {limit} bytes"),
            );
        }

        // Authorize
        let caller = invocation.caller;
        if !meta.auth.permits(caller.is_authenticated(), caller.is_admin) {
            return Completion::Failure(
                CallErrorKind::Authorization,
                format!("function `{}` requires {} access", meta.name, meta.auth),
            );
        }
        let auth_token = match self
            .tokens
            .create_internal_token(caller.user_id, caller.is_admin, self.limits.token_ttl)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(call_id = %call.id, error = %e, "failed to mint internal token");
                return Completion::Failure(
                    CallErrorKind::Authorization,
                    format!("failed to mint internal token: {e}"),
                );
            }
        };

        // Acquire
        let key = meta.pool_key();
        let warm = self.pool.get(&key);
        call.warm = warm.is_some();
        let pool_counter = if call.warm {
            names::POOL_HITS
        } else {
            names::POOL_MISSES
        };
        self.metrics.counter(pool_counter).inc();

        // Invoke
        let envelope = InvocationEnvelope {
            context: InvocationContext {
                api_base_url: self.api_base_url.clone(),
                auth_token,
                user_id: caller.user_id,
                is_admin: caller.is_admin,
                request_id: call.id.to_string(),
                function_name: meta.name.clone(),
                logging_enabled: self.live.current().logging_enabled,
                trigger: invocation.trigger.to_string(),
                warm: call.warm,
            },
            payload,
        };
        let outcome = self
            .executor
            .run(&meta.file_path, &envelope, self.limits.timeout)
            .await;

        // Release
        if matches!(&outcome, Ok(o) if o.is_reported()) {
            self.pool
                .put(&key, warm.unwrap_or_else(|| WarmProcess::marker(&key)));
        }

        self.complete(call, outcome)
    }

    fn complete(
        &self,
        call: &FunctionCall,
        outcome: Result<RunOutcome, SandboxError>,
    ) -> Completion {
        match outcome {
            Err(e) => {
                tracing::error!(call_id = %call.id, error = %e, "worker failed to start");
                Completion::Failure(CallErrorKind::ExecutorSpawn, e.to_string())
            }
            Ok(RunOutcome::TimedOut { after }) => {
                self.metrics.counter(names::CALLS_TIMED_OUT).inc();
                Completion::Failure(
                    CallErrorKind::Timeout,
                    format!("function timed out after {}s", after.as_secs_f64()),
                )
            }
            Ok(RunOutcome::Crashed { exit_code, stderr }) => {
                let status = exit_code.map_or_else(|| "a signal".to_owned(), |c| format!("code {c}"));
                Completion::Failure(
                    CallErrorKind::ExecutorCrash,
                    with_stderr(format!("worker exited with {status}"), &stderr),
                )
            }
            Ok(RunOutcome::InvalidOutput { detail, stderr }) => Completion::Failure(
                CallErrorKind::ExecutorOutput,
                with_stderr(format!("worker printed an invalid report: {detail}"), &stderr),
            ),
            Ok(RunOutcome::OversizedOutput { limit }) => Completion::Failure(
                CallErrorKind::ResultSize,
                format!("worker report exceeds {limit} bytes"),
            ),
            Ok(RunOutcome::Reported(ChildReport::Failed { error, error_type })) => {
                let kind = CallErrorKind::User(
                    error_type.unwrap_or_else(|| DEFAULT_USER_ERROR.to_owned()),
                );
                Completion::Failure(kind, error)
            }
            Ok(RunOutcome::Reported(ChildReport::Succeeded { result })) => {
                match self.limits.check_result_size(&result) {
                    Ok(_) => Completion::Success(result),
                    Err((limit, actual)) => Completion::Failure(
                        CallErrorKind::ResultSize,
                        format!("result is {actual} bytes, limit is {limit} bytes"),
                    ),
                }
            }
        }
    }

    fn observe(&self, call: &FunctionCall) {
        let duration_ms = call.duration_ms.unwrap_or(0);
        self.metrics
            .histogram(names::CALL_DURATION_MS)
            .observe(duration_ms);

        match &call.error_kind {
            None => {
                self.metrics.counter(names::CALLS_SUCCEEDED).inc();
                self.events.emit(CallEvent::CallSucceeded {
                    call_id: call.id,
                    function: call.function_name.clone(),
                    duration_ms,
                    warm: call.warm,
                });
                tracing::info!(
                    call_id = %call.id,
                    function = %call.function_name,
                    duration_ms,
                    warm = call.warm,
                    "call succeeded"
                );
            }
            Some(kind) => {
                self.metrics.counter(names::CALLS_FAILED).inc();
                self.events.emit(CallEvent::CallFailed {
                    call_id: call.id,
                    function: call.function_name.clone(),
                    kind: kind.to_string(),
                });
                tracing::warn!(
                    call_id = %call.id,
                    function = %call.function_name,
                    duration_ms,
                    kind = %kind,
                    error = call.error.as_deref().unwrap_or_default(),
                    "call failed"
                );
            }
        }
    }
}

fn with_stderr(message: String, stderr: &str) -> String {
    if stderr.is_empty() {
        message
    } else {
        format!("{message}: {stderr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn stderr_is_appended_when_present() {
        assert_eq!(with_stderr("exit 1".into(), ""), "exit 1");
        assert_eq!(with_stderr("exit 1".into(), "boom"), "exit 1: boom");
    }
}
