//! Error types for ledger operations.

use thiserror::Error;

use crate::types::{SessionId, SessionStatus, UserId};

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur against the persistence layer.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No session with this id exists.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// A session with this id already exists.
    #[error("session already exists: {0}")]
    SessionExists(SessionId),

    /// A debit was attempted against a user who has no wallet.
    #[error("wallet not found for user: {0}")]
    WalletNotFound(UserId),

    /// An operation that requires a specific status was issued against a
    /// session in a different one.
    #[error("session {session_id} is {status}, cannot {operation}")]
    InvalidTransition {
        session_id: SessionId,
        status: SessionStatus,
        operation: &'static str,
    },

    /// A charge was malformed, e.g. a per-unit commit with unit index 0.
    #[error("invalid charge for session {session_id}: {message}")]
    InvalidCharge {
        session_id: SessionId,
        message: String,
    },

    /// The backing store failed.
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl LedgerError {
    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an invalid-charge error.
    pub fn invalid_charge(session_id: SessionId, message: impl Into<String>) -> Self {
        Self::InvalidCharge {
            session_id,
            message: message.into(),
        }
    }
}
