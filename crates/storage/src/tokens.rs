use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use nimbus_core::UserId;
use nimbus_ports::{PortsError, TokenIssuer};
use parking_lot::Mutex;

/// A minted token as remembered by [`MemoryTokenIssuer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// `None` for the system.
    pub user_id: Option<UserId>,
    /// Admin scope.
    pub is_admin: bool,
    /// Expiry instant.
    pub expires_at: DateTime<Utc>,
}

/// Random opaque tokens kept in a map until purged.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenIssuer {
    tokens: Arc<Mutex<HashMap<String, IssuedToken>>>,
}

impl MemoryTokenIssuer {
    /// Empty issuer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The record for `token` if it exists and has not expired.
    #[must_use]
    pub fn verify(&self, token: &str) -> Option<IssuedToken> {
        let now = Utc::now();
        self.tokens
            .lock()
            .get(token)
            .filter(|t| t.expires_at > now)
            .cloned()
    }

    /// Tokens currently held, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    /// `true` when no tokens are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

#[async_trait]
impl TokenIssuer for MemoryTokenIssuer {
    async fn create_internal_token(
        &self,
        user_id: Option<UserId>,
        is_admin: bool,
        ttl: Duration,
    ) -> Result<String, PortsError> {
        let ttl = TimeDelta::from_std(ttl)
            .map_err(|e| PortsError::Internal(format!("token ttl out of range: {e}")))?;
        let token = format!("nimbus_{}", uuid::Uuid::new_v4().simple());
        self.tokens.lock().insert(
            token.clone(),
            IssuedToken {
                user_id,
                is_admin,
                expires_at: Utc::now() + ttl,
            },
        );
        Ok(token)
    }

    async fn purge_expired(&self) -> Result<usize, PortsError> {
        let now = Utc::now();
        let mut tokens = self.tokens.lock();
        let before = tokens.len();
        tokens.retain(|_, t| t.expires_at > now);
        let purged = before - tokens.len();
        if purged > 0 {
            tracing::debug!(purged, "purged expired internal tokens");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn minted_token_verifies() {
        let issuer = MemoryTokenIssuer::new();
        let user = UserId::v4();
        let token = issuer
            .create_internal_token(Some(user), false, Duration::from_secs(300))
            .await
            .unwrap();
        assert!(token.starts_with("nimbus_"));

        let record = issuer.verify(&token).unwrap();
        assert_eq!(record.user_id, Some(user));
        assert!(!record.is_admin);
        assert_eq!(issuer.verify("nope"), None);
    }

    #[tokio::test]
    async fn purge_removes_only_expired() {
        let issuer = MemoryTokenIssuer::new();
        let dead = issuer
            .create_internal_token(None, true, Duration::ZERO)
            .await
            .unwrap();
        issuer
            .create_internal_token(None, true, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(issuer.verify(&dead), None);
        assert_eq!(issuer.purge_expired().await.unwrap(), 1);
        assert_eq!(issuer.len(), 1);
        assert_eq!(issuer.purge_expired().await.unwrap(), 0);
    }
}
