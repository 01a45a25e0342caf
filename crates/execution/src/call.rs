//! The persisted record of one invocation.

use chrono::{DateTime, Utc};
use nimbus_core::{FunctionCallId, UserId, VersionId};
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::invocation::{Invocation, Trigger};
use crate::kind::CallErrorKind;
use crate::status::CallStatus;
use crate::transition::validate_transition;

/// One row of call history.
///
/// Inserted with status `running` when the engine admits a request and
/// finished exactly once through [`succeed`](Self::succeed) or
/// [`fail`](Self::fail). `finished_at` is clamped so it is never earlier
/// than `started_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Row id.
    pub id: FunctionCallId,
    /// Registry name of the invoked function.
    pub function_name: String,
    /// Current status.
    pub status: CallStatus,
    /// What caused the call.
    pub trigger: Trigger,
    /// Schedule id or request id, if any.
    pub trigger_id: Option<String>,
    /// User the call ran on behalf of.
    pub user_id: Option<UserId>,
    /// Version of the source that was executed.
    pub version_id: Option<VersionId>,
    /// Dispatch time.
    pub started_at: DateTime<Utc>,
    /// Completion time.
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: Option<u64>,
    /// Result payload on success.
    pub result: Option<serde_json::Value>,
    /// Human-readable failure message.
    pub error: Option<String>,
    /// Failure classification.
    pub error_kind: Option<CallErrorKind>,
    /// Whether a warm-pool marker was consumed for this call.
    #[serde(default)]
    pub warm: bool,
}

impl FunctionCall {
    /// A new `running` row stamped with the current time.
    pub fn start(
        function_name: impl Into<String>,
        invocation: &Invocation,
        version_id: Option<VersionId>,
    ) -> Self {
        Self::start_at(function_name, invocation, version_id, Utc::now())
    }

    /// A new `running` row with an explicit start time.
    pub fn start_at(
        function_name: impl Into<String>,
        invocation: &Invocation,
        version_id: Option<VersionId>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: FunctionCallId::v4(),
            function_name: function_name.into(),
            status: CallStatus::Running,
            trigger: invocation.trigger,
            trigger_id: invocation.trigger_id.clone(),
            user_id: invocation.caller.user_id,
            version_id,
            started_at,
            finished_at: None,
            duration_ms: None,
            result: None,
            error: None,
            error_kind: None,
            warm: false,
        }
    }

    /// Record a successful completion.
    pub fn succeed(
        &mut self,
        result: serde_json::Value,
        finished_at: DateTime<Utc>,
    ) -> Result<(), ExecutionError> {
        validate_transition(self.status, CallStatus::Succeeded)?;
        self.status = CallStatus::Succeeded;
        self.result = Some(result);
        self.stamp_finish(finished_at);
        Ok(())
    }

    /// Record a failure.
    pub fn fail(
        &mut self,
        kind: CallErrorKind,
        message: impl Into<String>,
        finished_at: DateTime<Utc>,
    ) -> Result<(), ExecutionError> {
        validate_transition(self.status, CallStatus::Failed)?;
        self.status = CallStatus::Failed;
        self.error = Some(message.into());
        self.error_kind = Some(kind);
        self.stamp_finish(finished_at);
        Ok(())
    }

    fn stamp_finish(&mut self, finished_at: DateTime<Utc>) {
        let finished_at = finished_at.max(self.started_at);
        let millis = (finished_at - self.started_at).num_milliseconds();
        self.finished_at = Some(finished_at);
        self.duration_ms = Some(u64::try_from(millis).unwrap_or(0));
    }

    /// Returns `true` once the row has been finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
