//! Internal token port.

use std::time::Duration;

use async_trait::async_trait;
use nimbus_core::UserId;

use crate::error::PortsError;

/// Mints short-lived tokens a running function uses to call back into the API.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Create a token for `user_id` (or the system when `None`) valid for `ttl`.
    async fn create_internal_token(
        &self,
        user_id: Option<UserId>,
        is_admin: bool,
        ttl: Duration,
    ) -> Result<String, PortsError>;

    /// Delete expired tokens. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, PortsError>;
}
