//! # Ledger Error Types
//!
//! The single error type returned by every orchestrated operation.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Ledger Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Identity     │  │    Domain       │  │      Store              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │ Unauthenticated │  │ Core(CoreError) │  │ Db(DbError)             │ │
//! │  │                 │  │ Validation      │  │ RetriesExhausted        │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Every variant maps to one stable ErrorKind through `kind()`.          │
//! │  Store details are logged, never returned to callers.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use festa_core::{CoreError, ErrorKind, ValidationError};
use festa_db::DbError;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger error type.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Missing, malformed or expired identity token.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Request input failed validation before any read.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Store failure. Conflicts are retried before they get this far.
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    /// The unit of work kept conflicting.
    #[error("transaction conflict retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load the configuration file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// A cached idempotency result could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The projector task is gone.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl LedgerError {
    /// Stable category for transport mapping.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            LedgerError::Core(err) => err.kind(),
            LedgerError::Validation(_) => ErrorKind::InvalidArgument,
            LedgerError::Db(DbError::NotFound { .. }) => ErrorKind::NotFound,
            LedgerError::Db(_)
            | LedgerError::RetriesExhausted { .. }
            | LedgerError::InvalidConfig(_)
            | LedgerError::ConfigLoadFailed(_)
            | LedgerError::Serialization(_)
            | LedgerError::ChannelError(_) => ErrorKind::Internal,
        }
    }

    /// True when re-running the unit of work may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Db(err) if err.is_conflict())
    }

    /// Message safe to return to a caller.
    pub fn public_message(&self) -> String {
        match self {
            LedgerError::RetriesExhausted { .. } => {
                "transaction conflict retries exhausted".to_string()
            }
            _ if self.kind() == ErrorKind::Internal => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let err: LedgerError = CoreError::IdempotencyKeyMismatch.into();
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);

        let err: LedgerError = ValidationError::AboveMaximum {
            field: "count".into(),
            max: 500,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.public_message(), "Maximum is 500");

        let err = LedgerError::Unauthenticated("missing bearer token".into());
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[test]
    fn test_conflicts_and_internal_messages() {
        let err: LedgerError = DbError::conflict("customer c-1 changed").into();
        assert!(err.is_conflict());
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "internal error");

        let err = LedgerError::RetriesExhausted { attempts: 8 };
        assert!(!err.is_conflict());
        assert_eq!(
            err.public_message(),
            "transaction conflict retries exhausted"
        );
    }
}
