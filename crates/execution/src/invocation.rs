//! Who requested a call and through which path.

use std::fmt;

use nimbus_core::UserId;
use serde::{Deserialize, Serialize};

/// What caused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A direct request, e.g. an HTTP route or the CLI.
    Manual,
    /// A scheduler tick.
    Schedule,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Schedule => write!(f, "schedule"),
        }
    }
}

/// Identity the internal token is minted for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// `None` for anonymous callers and for the system.
    pub user_id: Option<UserId>,
    /// Admin rights inside the function's API calls.
    pub is_admin: bool,
}

impl Caller {
    /// An anonymous, non-admin caller.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A signed-in user.
    #[must_use]
    pub fn user(user_id: UserId, is_admin: bool) -> Self {
        Self {
            user_id: Some(user_id),
            is_admin,
        }
    }

    /// The host itself, used for scheduled runs.
    #[must_use]
    pub fn system() -> Self {
        Self {
            user_id: None,
            is_admin: true,
        }
    }

    /// Returns `true` when a user id is attached.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Everything about a call request other than the function and payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// What caused the call.
    pub trigger: Trigger,
    /// Schedule id for scheduled runs, request id or similar for manual ones.
    pub trigger_id: Option<String>,
    /// Identity the call runs as.
    pub caller: Caller,
}

impl Invocation {
    /// A manual call on behalf of `caller`.
    #[must_use]
    pub fn manual(caller: Caller) -> Self {
        Self {
            trigger: Trigger::Manual,
            trigger_id: None,
            caller,
        }
    }

    /// A scheduled run, executed as the system caller.
    pub fn scheduled(schedule_id: impl fmt::Display) -> Self {
        Self {
            trigger: Trigger::Schedule,
            trigger_id: Some(schedule_id.to_string()),
            caller: Caller::system(),
        }
    }

    /// Attach a trigger id.
    pub fn with_trigger_id(mut self, trigger_id: impl Into<String>) -> Self {
        self.trigger_id = Some(trigger_id.into());
        self
    }
}
