//! Error types for the URL sync engine.

use crate::QueryKey;
use thiserror::Error;

/// All possible errors from the sync engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Registration errors
    #[error("duplicate query key: {0}")]
    DuplicateKey(QueryKey),

    #[error("type mismatch for key '{key}': expected {expected}, got {got}")]
    TypeMismatch {
        key: QueryKey,
        expected: String,
        got: String,
    },

    // Codec errors
    #[error("invalid {kind} token '{token}': {reason}")]
    InvalidToken {
        kind: String,
        token: String,
        reason: String,
    },

    // Runtime errors
    #[error("write rejected for '{key}': {reason}")]
    WriteRejected { key: QueryKey, reason: String },

    #[error("router rejected replace: {0}")]
    RouterRejected(String),

    #[error("ready signal already received")]
    AlreadyReady,

    #[error("conflict not found: {0}")]
    ConflictNotFound(u64),
}

impl Error {
    /// Shorthand for a store refusing a value.
    pub fn rejected(key: impl Into<QueryKey>, reason: impl Into<String>) -> Self {
        Error::WriteRejected {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
