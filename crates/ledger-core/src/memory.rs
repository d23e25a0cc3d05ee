//! In-memory reference implementation of [`SessionLedger`].
//!
//! All conditional writes take one write guard over the whole inner state,
//! so a wallet debit, a ledger append and the record update land as a
//! single atomic step. This mirrors the compare-and-set semantics the
//! hosted backend provides in production.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::error::{LedgerError, Result};
use crate::ledger::SessionLedger;
use crate::types::{
    BillingEvent, ChargeKind, CommitOutcome, Credits, EndReason, Modality, SessionId,
    SessionRecord, SessionStats, SessionStatus, Settlement, StartOutcome, StatusChange, UserId,
};

/// Capacity of each per-session status broadcast channel. A session sees at
/// most two transitions, so lagging receivers are not a practical concern.
const STATUS_CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionRecord>,
    /// Committed billing events per session, in commit order.
    events: HashMap<SessionId, Vec<BillingEvent>>,
    settlements: HashMap<SessionId, Settlement>,
    wallets: HashMap<UserId, Credits>,
}

impl Inner {
    fn session_mut(&mut self, session_id: &SessionId) -> Result<&mut SessionRecord> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| LedgerError::SessionNotFound(session_id.clone()))
    }

    fn committed_sum(&self, session_id: &SessionId) -> Credits {
        self.events
            .get(session_id)
            .map(|events| events.iter().map(|e| e.amount).sum())
            .unwrap_or(0)
    }

    fn find_event(
        &self,
        session_id: &SessionId,
        kind: ChargeKind,
        unit_index: u32,
    ) -> Option<&BillingEvent> {
        self.events
            .get(session_id)?
            .iter()
            .find(|e| e.kind == kind && e.unit_index == unit_index)
    }
}

/// In-memory session ledger with atomic conditional operations.
pub struct InMemoryLedger {
    inner: Arc<RwLock<Inner>>,
    watchers: DashMap<SessionId, broadcast::Sender<StatusChange>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            watchers: DashMap::new(),
        }
    }

    /// Load credits into a wallet. Test and demo plumbing; how funds reach
    /// a balance in production is outside this crate.
    pub async fn deposit(&self, user: &UserId, amount: Credits) -> Credits {
        let mut inner = self.inner.write().await;
        let balance = inner.wallets.entry(user.clone()).or_insert(0);
        *balance += amount;
        debug!("Deposited {} credits for {}, balance {}", amount, user, balance);
        *balance
    }

    /// All stored sessions.
    pub async fn list_sessions(&self) -> Vec<SessionRecord> {
        let inner = self.inner.read().await;
        inner.sessions.values().cloned().collect()
    }

    /// Status breakdown across all stored sessions.
    pub async fn stats(&self) -> SessionStats {
        let inner = self.inner.read().await;
        let mut stats = SessionStats::default();
        for session in inner.sessions.values() {
            stats.total += 1;
            match session.status {
                SessionStatus::Pending => stats.pending += 1,
                SessionStatus::Active => stats.active += 1,
                SessionStatus::Completed => stats.completed += 1,
                SessionStatus::Cancelled => stats.cancelled += 1,
            }
        }
        stats
    }

    fn publish(&self, change: StatusChange) {
        if let Some(sender) = self.watchers.get(&change.session_id) {
            // Nobody subscribed yet is fine; the record itself is the
            // source of truth, the channel only accelerates convergence.
            let _ = sender.send(change);
        }
    }

    fn watcher(&self, session_id: &SessionId) -> broadcast::Sender<StatusChange> {
        self.watchers
            .entry(session_id.clone())
            .or_insert_with(|| broadcast::channel(STATUS_CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionLedger for InMemoryLedger {
    async fn create_session(
        &self,
        client: &UserId,
        provider: &UserId,
        modality: Modality,
    ) -> Result<SessionRecord> {
        let record = SessionRecord {
            id: SessionId::new(),
            client: client.clone(),
            provider: provider.clone(),
            modality,
            status: SessionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            duration_seconds: 0,
            total_credits: 0,
            end_reason: None,
        };

        let mut inner = self.inner.write().await;
        if inner.sessions.contains_key(&record.id) {
            return Err(LedgerError::SessionExists(record.id));
        }
        inner.sessions.insert(record.id.clone(), record.clone());
        info!(
            "Created session {} ({} -> {})",
            record.id, record.client, record.provider
        );
        Ok(record)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<SessionRecord> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| LedgerError::SessionNotFound(session_id.clone()))
    }

    async fn start_session(&self, session_id: &SessionId) -> Result<StartOutcome> {
        let mut inner = self.inner.write().await;
        let record = inner.session_mut(session_id)?;

        match record.status {
            SessionStatus::Pending => {
                let started_at = Utc::now();
                record.status = SessionStatus::Active;
                record.started_at = Some(started_at);
                info!("Session {} started", session_id);
                drop(inner);
                self.publish(StatusChange {
                    session_id: session_id.clone(),
                    status: SessionStatus::Active,
                    end_reason: None,
                });
                Ok(StartOutcome::Started { started_at })
            }
            SessionStatus::Active => {
                let started_at = record
                    .started_at
                    .ok_or_else(|| LedgerError::storage("active session without started_at"))?;
                Ok(StartOutcome::AlreadyActive { started_at })
            }
            status => Ok(StartOutcome::AlreadyTerminal(status)),
        }
    }

    async fn commit_billing_event(
        &self,
        session_id: &SessionId,
        kind: ChargeKind,
        unit_index: u32,
        amount: Credits,
    ) -> Result<CommitOutcome> {
        match (kind, unit_index) {
            (ChargeKind::InitialFee, i) if i != 0 => {
                return Err(LedgerError::invalid_charge(
                    session_id.clone(),
                    "initial fee must use unit index 0",
                ));
            }
            (ChargeKind::PerUnit, 0) => {
                return Err(LedgerError::invalid_charge(
                    session_id.clone(),
                    "per-unit charges start at unit index 1",
                ));
            }
            _ => {}
        }

        let mut inner = self.inner.write().await;

        // Idempotency check before anything is touched.
        if let Some(existing) = inner.find_event(session_id, kind, unit_index) {
            debug!(
                "Duplicate commit for {} {:?} unit {}, returning committed event",
                session_id, kind, unit_index
            );
            return Ok(CommitOutcome::AlreadyCommitted(existing.clone()));
        }

        let record = inner.session_mut(session_id)?;
        match record.status {
            SessionStatus::Active => {}
            status if status.is_terminal() => return Ok(CommitOutcome::SessionClosed),
            status => {
                return Err(LedgerError::InvalidTransition {
                    session_id: session_id.clone(),
                    status,
                    operation: "commit billing event",
                });
            }
        }

        let payer = record.client.clone();
        let balance = inner
            .wallets
            .get(&payer)
            .copied()
            .ok_or_else(|| LedgerError::WalletNotFound(payer.clone()))?;
        if balance < amount {
            warn!(
                "Charge rejected for {}: balance {} < required {}",
                session_id, balance, amount
            );
            return Ok(CommitOutcome::InsufficientFunds {
                balance,
                required: amount,
            });
        }

        // Debit, append and update the record total in one atomic step.
        let balance_after = balance - amount;
        inner.wallets.insert(payer, balance_after);
        let event = BillingEvent {
            session_id: session_id.clone(),
            kind,
            unit_index,
            amount,
            committed_at: Utc::now(),
        };
        inner
            .events
            .entry(session_id.clone())
            .or_default()
            .push(event.clone());
        let record = inner.session_mut(session_id)?;
        record.total_credits += amount;

        debug!(
            "Committed {:?} unit {} ({} credits) for {}, payer balance {}",
            kind, unit_index, amount, session_id, balance_after
        );
        Ok(CommitOutcome::Committed {
            event,
            balance_after,
        })
    }

    async fn finalize_session(
        &self,
        session_id: &SessionId,
        local_duration_hint: Option<u64>,
        reason: EndReason,
    ) -> Result<Settlement> {
        let mut inner = self.inner.write().await;

        // Redundant finalize: return the frozen settlement untouched.
        if let Some(settlement) = inner.settlements.get(session_id) {
            debug!("Redundant finalize for {}, returning settlement", session_id);
            return Ok(settlement.clone());
        }

        let earnings = inner.committed_sum(session_id);
        let record = inner.session_mut(session_id)?;

        let settlement = match record.status {
            SessionStatus::Pending => {
                // Never connected; no duration, nothing billed.
                record.status = SessionStatus::Cancelled;
                record.end_reason = Some(reason);
                record.duration_seconds = 0;
                Settlement {
                    session_id: session_id.clone(),
                    status: SessionStatus::Cancelled,
                    end_reason: reason,
                    duration_seconds: 0,
                    earnings: 0,
                }
            }
            SessionStatus::Active => {
                let started_at = record
                    .started_at
                    .ok_or_else(|| LedgerError::storage("active session without started_at"))?;
                let elapsed = (Utc::now() - started_at).num_seconds().max(0) as u64;
                let duration = local_duration_hint.unwrap_or(elapsed);

                record.status = SessionStatus::Completed;
                record.end_reason = Some(reason);
                record.duration_seconds = duration;
                debug_assert_eq!(record.total_credits, earnings);

                let provider = record.provider.clone();
                let settlement = Settlement {
                    session_id: session_id.clone(),
                    status: SessionStatus::Completed,
                    end_reason: reason,
                    duration_seconds: duration,
                    earnings,
                };
                // Provider is paid out of the same atomic step that
                // freezes the settlement, so it cannot happen twice.
                *inner.wallets.entry(provider).or_insert(0) += earnings;
                settlement
            }
            status => {
                // Terminal without a settlement cannot happen through this
                // implementation; treat it as storage corruption.
                return Err(LedgerError::storage(format!(
                    "session {} is {} but has no settlement",
                    session_id, status
                )));
            }
        };

        inner
            .settlements
            .insert(session_id.clone(), settlement.clone());
        info!(
            "Session {} settled: {} after {}s, {} credits earned ({:?})",
            session_id,
            settlement.status,
            settlement.duration_seconds,
            settlement.earnings,
            settlement.end_reason
        );
        drop(inner);

        self.publish(StatusChange {
            session_id: session_id.clone(),
            status: settlement.status,
            end_reason: Some(settlement.end_reason),
        });
        Ok(settlement)
    }

    async fn subscribe(&self, session_id: &SessionId) -> Result<BroadcastStream<StatusChange>> {
        // Subscribing to a session that does not exist is a caller bug.
        self.get_session(session_id).await?;
        Ok(BroadcastStream::new(self.watcher(session_id).subscribe()))
    }

    async fn billing_events(&self, session_id: &SessionId) -> Result<Vec<BillingEvent>> {
        let inner = self.inner.read().await;
        Ok(inner.events.get(session_id).cloned().unwrap_or_default())
    }

    async fn balance(&self, user: &UserId) -> Result<Credits> {
        let inner = self.inner.read().await;
        Ok(inner.wallets.get(user).copied().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn session_fixture(ledger: &InMemoryLedger, balance: Credits) -> SessionRecord {
        let client = UserId::new("client-1");
        let provider = UserId::new("provider-1");
        ledger.deposit(&client, balance).await;
        ledger
            .create_session(&client, &provider, Modality::Video)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn start_succeeds_once() {
        let ledger = InMemoryLedger::new();
        let session = session_fixture(&ledger, 100).await;

        let first = ledger.start_session(&session.id).await.unwrap();
        assert!(matches!(first, StartOutcome::Started { .. }));

        let second = ledger.start_session(&session.id).await.unwrap();
        assert!(matches!(second, StartOutcome::AlreadyActive { .. }));
    }

    #[tokio::test]
    async fn duplicate_commit_is_a_noop() {
        let ledger = InMemoryLedger::new();
        let session = session_fixture(&ledger, 100).await;
        ledger.start_session(&session.id).await.unwrap();

        let first = ledger
            .commit_billing_event(&session.id, ChargeKind::PerUnit, 1, 10)
            .await
            .unwrap();
        let CommitOutcome::Committed { event, balance_after } = first else {
            panic!("expected committed, got {:?}", first);
        };
        assert_eq!(balance_after, 90);

        let second = ledger
            .commit_billing_event(&session.id, ChargeKind::PerUnit, 1, 10)
            .await
            .unwrap();
        assert_eq!(second, CommitOutcome::AlreadyCommitted(event));

        // Only one debit happened.
        assert_eq!(ledger.balance(&session.client).await.unwrap(), 90);
    }

    #[tokio::test]
    async fn insufficient_funds_rejects_whole_charge() {
        let ledger = InMemoryLedger::new();
        let session = session_fixture(&ledger, 4).await;
        ledger.start_session(&session.id).await.unwrap();

        let outcome = ledger
            .commit_billing_event(&session.id, ChargeKind::PerUnit, 1, 5)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CommitOutcome::InsufficientFunds {
                balance: 4,
                required: 5
            }
        );
        // Nothing partially applied.
        assert_eq!(ledger.balance(&session.client).await.unwrap(), 4);
        assert!(ledger.billing_events(&session.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commit_against_closed_session() {
        let ledger = InMemoryLedger::new();
        let session = session_fixture(&ledger, 100).await;
        ledger.start_session(&session.id).await.unwrap();
        ledger
            .finalize_session(&session.id, Some(10), EndReason::Hangup)
            .await
            .unwrap();

        let outcome = ledger
            .commit_billing_event(&session.id, ChargeKind::PerUnit, 1, 10)
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::SessionClosed);
    }

    #[tokio::test]
    async fn debit_without_a_wallet_is_an_error() {
        let ledger = InMemoryLedger::new();
        let client = UserId::new("client-1");
        let provider = UserId::new("provider-1");
        let session = ledger
            .create_session(&client, &provider, Modality::Video)
            .await
            .unwrap();
        ledger.start_session(&session.id).await.unwrap();

        let err = ledger
            .commit_billing_event(&session.id, ChargeKind::PerUnit, 1, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::WalletNotFound(_)));
    }

    #[tokio::test]
    async fn per_unit_index_zero_is_rejected() {
        let ledger = InMemoryLedger::new();
        let session = session_fixture(&ledger, 100).await;
        ledger.start_session(&session.id).await.unwrap();

        let err = ledger
            .commit_billing_event(&session.id, ChargeKind::PerUnit, 0, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCharge { .. }));
    }

    #[tokio::test]
    async fn finalize_pays_provider_from_the_ledger() {
        let ledger = InMemoryLedger::new();
        let session = session_fixture(&ledger, 100).await;
        ledger.start_session(&session.id).await.unwrap();
        ledger
            .commit_billing_event(&session.id, ChargeKind::InitialFee, 0, 3)
            .await
            .unwrap();
        ledger
            .commit_billing_event(&session.id, ChargeKind::PerUnit, 1, 10)
            .await
            .unwrap();

        let settlement = ledger
            .finalize_session(&session.id, Some(65), EndReason::Hangup)
            .await
            .unwrap();
        assert_eq!(settlement.duration_seconds, 65);
        assert_eq!(settlement.earnings, 13);
        assert_eq!(settlement.status, SessionStatus::Completed);
        assert_eq!(ledger.balance(&session.provider).await.unwrap(), 13);

        // The record froze the same figures.
        let record = ledger.get_session(&session.id).await.unwrap();
        assert_eq!(record.duration_seconds, 65);
        assert_eq!(record.total_credits, 13);
        assert_eq!(record.end_reason, Some(EndReason::Hangup));
    }

    #[tokio::test]
    async fn finalize_pending_cancels_with_zero_billing() {
        let ledger = InMemoryLedger::new();
        let session = session_fixture(&ledger, 100).await;

        let settlement = ledger
            .finalize_session(&session.id, None, EndReason::CounterpartTimeout)
            .await
            .unwrap();
        assert_eq!(settlement.status, SessionStatus::Cancelled);
        assert_eq!(settlement.earnings, 0);
        assert_eq!(settlement.duration_seconds, 0);

        let record = ledger.get_session(&session.id).await.unwrap();
        assert_eq!(record.status, SessionStatus::Cancelled);
        assert_eq!(record.total_credits, 0);
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let ledger = InMemoryLedger::new();
        let a = session_fixture(&ledger, 10).await;
        let _b = session_fixture(&ledger, 10).await;
        ledger.start_session(&a.id).await.unwrap();

        let stats = ledger.stats().await;
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.pending, 1);
    }
}
