//! State machine transition validation for call status.

use crate::error::ExecutionError;
use crate::status::CallStatus;

/// Returns `true` if a call may move from `from` to `to`.
///
/// A call leaves `running` exactly once and is immutable afterwards.
#[must_use]
pub fn can_transition(from: CallStatus, to: CallStatus) -> bool {
    matches!(
        (from, to),
        (CallStatus::Running, CallStatus::Succeeded) | (CallStatus::Running, CallStatus::Failed)
    )
}

/// Validate a transition, returning an error if invalid.
pub fn validate_transition(from: CallStatus, to: CallStatus) -> Result<(), ExecutionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::invalid_transition(from, to))
    }
}
