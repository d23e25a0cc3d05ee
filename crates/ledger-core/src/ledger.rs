//! The persistence-layer contract: atomic conditional operations.

use async_trait::async_trait;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::Result;
use crate::types::{
    BillingEvent, ChargeKind, CommitOutcome, Credits, EndReason, Modality, SessionId,
    SessionRecord, Settlement, StartOutcome, StatusChange, UserId,
};

/// Atomic session and billing operations.
///
/// Every mutating operation is an atomic conditional write: concurrent
/// invocation by both participants must resolve to exactly one winner, with
/// both callers observing an identical result. Implementations must never
/// apply a charge partially.
#[async_trait]
pub trait SessionLedger: Send + Sync {
    /// Create a session row in `Pending`, owned jointly by both
    /// participants from this point on.
    async fn create_session(
        &self,
        client: &UserId,
        provider: &UserId,
        modality: Modality,
    ) -> Result<SessionRecord>;

    /// Fetch the current session record.
    async fn get_session(&self, session_id: &SessionId) -> Result<SessionRecord>;

    /// Atomically transition `Pending -> Active`. Both participants may
    /// call this; it succeeds for the first caller only.
    async fn start_session(&self, session_id: &SessionId) -> Result<StartOutcome>;

    /// Commit a charge, guarded by the `(session, kind, unit_index)`
    /// idempotency key. Debits the payer and updates `total_credits` in the
    /// same atomic step, or rejects the charge whole.
    async fn commit_billing_event(
        &self,
        session_id: &SessionId,
        kind: ChargeKind,
        unit_index: u32,
        amount: Credits,
    ) -> Result<CommitOutcome>;

    /// The one idempotent settlement operation. The first caller freezes
    /// duration and earnings (earnings from the committed ledger, never
    /// from client-reported time); every subsequent caller receives the
    /// identical previously-committed [`Settlement`].
    async fn finalize_session(
        &self,
        session_id: &SessionId,
        local_duration_hint: Option<u64>,
        reason: EndReason,
    ) -> Result<Settlement>;

    /// Subscribe to this session's status transitions. Delivery is
    /// asynchronous; cancellation observed through this stream is bounded
    /// by its propagation latency.
    async fn subscribe(&self, session_id: &SessionId) -> Result<BroadcastStream<StatusChange>>;

    /// All committed billing events for a session, in commit order.
    async fn billing_events(&self, session_id: &SessionId) -> Result<Vec<BillingEvent>>;

    /// Current wallet balance for a user. A read replica at best; the only
    /// authority over balances is [`Self::commit_billing_event`].
    async fn balance(&self, user: &UserId) -> Result<Credits>;
}
