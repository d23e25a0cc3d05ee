//! Session records, billing ledger and atomic settlement operations.
//!
//! This crate is the persistence-layer collaborator of the Counsel session
//! engine. Two participant processes never talk to each other directly; they
//! coordinate exclusively through the conditional operations defined here:
//!
//! - [`SessionLedger::start_session`]: first caller wins, the session moves
//!   `Pending -> Active` exactly once.
//! - [`SessionLedger::commit_billing_event`]: append-only charges guarded by
//!   an idempotency key `(session, kind, unit index)`. A retried or duplicate
//!   commit returns the already-committed event. A charge that would drive
//!   the payer's balance negative is rejected whole.
//! - [`SessionLedger::finalize_session`]: the single settlement path. The
//!   first caller freezes duration and earnings; every later caller (either
//!   participant, a timeout, an error path) receives the identical result.
//! - [`SessionLedger::subscribe`]: status-change stream that lets one
//!   participant observe the other's terminal write.
//!
//! [`InMemoryLedger`] is the reference implementation with exactly these
//! semantics; production deployments implement [`SessionLedger`] against the
//! hosted backend's compare-and-set primitives.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod types;

pub use error::{LedgerError, Result};
pub use ledger::SessionLedger;
pub use memory::InMemoryLedger;
pub use types::{
    BillingEvent, ChargeKind, CommitOutcome, Credits, EndReason, Modality, SessionId,
    SessionRecord, SessionStats, SessionStatus, Settlement, StartOutcome, StatusChange, UserId,
};
