//! Error types for the session engine.

use counsel_ledger_core::{Credits, LedgerError};
use thiserror::Error;

/// Result type for session engine operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while running a session.
///
/// A redundant finalize is deliberately absent here: a finalize attempt
/// against an already-settled session returns the frozen settlement and is
/// treated as success.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Media transport failure (join failed, device busy or denied).
    /// User-facing and retryable by re-invoking join.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// A unit charge was rejected. Ends the active session; not retryable
    /// for that session.
    #[error("insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: Credits, required: Credits },

    /// The remote finalize call failed. The engine degrades to a local
    /// best-effort summary; resources are still released.
    #[error("settlement failed: {message}")]
    Settlement { message: String },

    /// The counterpart never stabilized within the no-show window.
    #[error("counterpart did not connect within {seconds} seconds")]
    NoShowTimeout { seconds: u64 },

    /// Persistence-layer failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The engine was driven outside its lifecycle.
    #[error("invalid state: {message}")]
    InvalidState { message: String },
}

impl SessionError {
    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a settlement error.
    pub fn settlement(message: impl Into<String>) -> Self {
        Self::Settlement {
            message: message.into(),
        }
    }

    /// Create an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
