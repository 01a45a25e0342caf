#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nimbus_core::{FunctionMeta, UserId};
use nimbus_execution::FunctionCall;
use nimbus_ports::{CallStore, PortsError, TokenIssuer};
use nimbus_runtime::{ExecutionEngine, FunctionRegistry, WarmPool};
use nimbus_sandbox::{
    ChildReport, InvocationEnvelope, IsolatedExecutor, MetadataReport, RunOutcome, SandboxError,
};
use nimbus_storage::{MemoryCallStore, MemoryTokenIssuer};
use parking_lot::Mutex;
use serde_json::{Value, json};

type RunFn = dyn Fn(&InvocationEnvelope) -> Result<RunOutcome, SandboxError> + Send + Sync;

/// In-memory stand-in for the worker program.
///
/// Metadata mode reports the file content (trimmed) as the function name;
/// content starting with `!broken` fails and `!slow` times out.
pub struct ScriptedExecutor {
    run_with: Box<RunFn>,
    pub runs: AtomicUsize,
    pub syncs: AtomicUsize,
    pub fail_sync: AtomicBool,
    pub envelopes: Mutex<Vec<InvocationEnvelope>>,
}

impl ScriptedExecutor {
    pub fn new(
        run_with: impl Fn(&InvocationEnvelope) -> Result<RunOutcome, SandboxError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            run_with: Box::new(run_with),
            runs: AtomicUsize::new(0),
            syncs: AtomicUsize::new(0),
            fail_sync: AtomicBool::new(false),
            envelopes: Mutex::new(Vec::new()),
        }
    }

    /// Reports `{"value": payload.value * 2}`.
    pub fn doubler() -> Self {
        Self::new(|envelope| {
            let value = envelope.payload["value"].as_i64().unwrap_or_default();
            Ok(RunOutcome::Reported(ChildReport::Succeeded {
                result: json!({ "value": value * 2 }),
            }))
        })
    }

    /// Always ends with `outcome`.
    pub fn returning(outcome: RunOutcome) -> Self {
        Self::new(move |_| Ok(outcome.clone()))
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn last_envelope(&self) -> Option<InvocationEnvelope> {
        self.envelopes.lock().last().cloned()
    }
}

#[async_trait]
impl IsolatedExecutor for ScriptedExecutor {
    async fn extract_metadata(
        &self,
        file: &Path,
        timeout: Duration,
    ) -> Result<MetadataReport, SandboxError> {
        let content = tokio::fs::read_to_string(file).await?;
        let content = content.trim();
        if content.starts_with("!broken") {
            return Err(SandboxError::Exited {
                code: Some(1),
                stderr: "SyntaxError".into(),
            });
        }
        if content.starts_with("!slow") {
            return Err(SandboxError::Timeout { after: timeout });
        }
        Ok(MetadataReport {
            name: content.to_owned(),
            description: format!("loaded from {}", file.display()),
            auth: nimbus_core::AuthLevel::Public,
            tags: Vec::new(),
            input_schema: None,
            output_schema: None,
        })
    }

    async fn sync_dependencies(&self, _file: &Path, _timeout: Duration) -> Result<(), SandboxError> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        if self.fail_sync.load(Ordering::SeqCst) {
            return Err(SandboxError::Exited {
                code: Some(1),
                stderr: "registry unreachable".into(),
            });
        }
        Ok(())
    }

    async fn run(
        &self,
        _file: &Path,
        envelope: &InvocationEnvelope,
        _timeout: Duration,
    ) -> Result<RunOutcome, SandboxError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.envelopes.lock().push(envelope.clone());
        (self.run_with)(envelope)
    }
}

/// Token issuer whose backing store is down.
pub struct FailingIssuer;

#[async_trait]
impl TokenIssuer for FailingIssuer {
    async fn create_internal_token(
        &self,
        _user_id: Option<UserId>,
        _is_admin: bool,
        _ttl: Duration,
    ) -> Result<String, PortsError> {
        Err(PortsError::Connection("token table unavailable".into()))
    }

    async fn purge_expired(&self) -> Result<usize, PortsError> {
        Err(PortsError::Connection("token table unavailable".into()))
    }
}

/// Call store that refuses every write.
pub struct BrokenCallStore;

#[async_trait]
impl CallStore for BrokenCallStore {
    async fn insert(&self, _call: &FunctionCall) -> Result<(), PortsError> {
        Err(PortsError::Connection("database is gone".into()))
    }

    async fn update(&self, _call: &FunctionCall) -> Result<(), PortsError> {
        Err(PortsError::Connection("database is gone".into()))
    }

    async fn get(
        &self,
        _id: nimbus_core::FunctionCallId,
    ) -> Result<Option<FunctionCall>, PortsError> {
        Ok(None)
    }

    async fn list_for_function(
        &self,
        _function_name: &str,
        _limit: usize,
    ) -> Result<Vec<FunctionCall>, PortsError> {
        Ok(Vec::new())
    }
}

/// Everything an engine test needs to inspect.
pub struct Harness {
    pub engine: Arc<ExecutionEngine>,
    pub executor: Arc<ScriptedExecutor>,
    pub registry: Arc<FunctionRegistry>,
    pub pool: Arc<WarmPool>,
    pub calls: MemoryCallStore,
    pub tokens: MemoryTokenIssuer,
}

impl Harness {
    pub fn new(executor: ScriptedExecutor) -> Self {
        Self::with_engine(executor, |engine| engine)
    }

    pub fn with_engine(
        executor: ScriptedExecutor,
        configure: impl FnOnce(ExecutionEngine) -> ExecutionEngine,
    ) -> Self {
        let executor = Arc::new(executor);
        let registry = Arc::new(FunctionRegistry::new());
        let pool = Arc::new(WarmPool::new(3, Some(Duration::from_secs(300))));
        let calls = MemoryCallStore::new();
        let tokens = MemoryTokenIssuer::new();
        let engine = ExecutionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&pool),
            executor.clone(),
            Arc::new(calls.clone()),
            Arc::new(tokens.clone()),
        );
        Self {
            engine: Arc::new(configure(engine)),
            executor,
            registry,
            pool,
            calls,
            tokens,
        }
    }

    /// Register a public function backed by `/fns/<name>.ts`.
    pub fn register(&self, name: &str) -> Arc<FunctionMeta> {
        let meta = Arc::new(
            FunctionMeta::new(name, format!("/fns/{name}.ts"))
                .with_auth(nimbus_core::AuthLevel::Public),
        );
        self.registry.register(Arc::clone(&meta));
        meta
    }
}

pub fn payload(value: i64) -> Value {
    json!({ "value": value })
}
