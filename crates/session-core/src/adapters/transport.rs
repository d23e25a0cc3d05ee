use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::errors::Result;
use crate::events::TransportEvent;

/// Short-lived credentials for joining a media channel.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportCredentials {
    /// Channel name, one per session.
    pub channel: String,
    /// Opaque token issued for this participant.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl TransportCredentials {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Media/signaling transport collaborator.
///
/// Implementations deliver presence events through a single-consumer
/// channel obtained from [`MediaTransport::take_events`]; the engine is the
/// only consumer and processes events strictly in arrival order.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Join the channel named in the credentials.
    async fn join(&self, credentials: &TransportCredentials) -> Result<()>;

    /// Publish the local media track.
    async fn publish(&self) -> Result<()>;

    /// Withdraw the local media track without leaving the channel.
    async fn unpublish(&self) -> Result<()>;

    /// Leave the channel and release all local media resources.
    async fn leave(&self) -> Result<()>;

    /// Take the presence event receiver. Yields `None` after the first
    /// call; there is exactly one consumer.
    async fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;
}
