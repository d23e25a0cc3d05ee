//! The engine's building blocks.
//!
//! The stabilizer, ticker and guard are pure tick-driven state machines
//! with no I/O; the finalizer and synchronizer are the two pieces that
//! touch the collaborators. The controller composes all of them.

pub mod finalizer;
pub mod guard;
pub mod stabilizer;
pub mod synchronizer;
pub mod ticker;

pub use finalizer::{FinalizationCoordinator, FinalizeTrigger};
pub use guard::NoShowGuard;
pub use stabilizer::ConnectionStabilizer;
pub use ticker::{BillingTicker, ChargeRequest};
