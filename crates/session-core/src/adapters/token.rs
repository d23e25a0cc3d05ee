use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use counsel_ledger_core::{SessionId, UserId};

use crate::adapters::transport::TransportCredentials;
use crate::errors::Result;

/// Token issuance collaborator: session id + participant id in,
/// short-lived transport credentials out.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(
        &self,
        session_id: &SessionId,
        participant: &UserId,
    ) -> Result<TransportCredentials>;
}

/// Deterministic issuer for tests and demos. Tokens carry no signature;
/// production deployments call the hosted token endpoint instead.
pub struct StaticTokenIssuer {
    ttl_seconds: i64,
}

impl StaticTokenIssuer {
    pub fn new(ttl_seconds: i64) -> Self {
        Self { ttl_seconds }
    }
}

impl Default for StaticTokenIssuer {
    fn default() -> Self {
        // Long enough for any one consultation.
        Self::new(4 * 3600)
    }
}

#[async_trait]
impl TokenIssuer for StaticTokenIssuer {
    async fn issue(
        &self,
        session_id: &SessionId,
        participant: &UserId,
    ) -> Result<TransportCredentials> {
        Ok(TransportCredentials {
            channel: session_id.0.clone(),
            token: format!("tok-{}-{}-{}", session_id, participant, uuid::Uuid::new_v4()),
            expires_at: Utc::now() + ChronoDuration::seconds(self.ttl_seconds),
        })
    }
}
