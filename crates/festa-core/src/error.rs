//! # Error Types
//!
//! Domain-specific error types for festa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  festa-core errors (this file)                                         │
//! │  ├── ErrorKind        - Stable, client-facing error category           │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  festa-db errors (separate crate)                                      │
//! │  └── DbError          - Store failures and conflicts                   │
//! │                                                                         │
//! │  festa-ledger errors                                                   │
//! │  └── LedgerError      - What an orchestrated call returns              │
//! │                                                                         │
//! │  festa-api errors                                                      │
//! │  └── ApiError         - What HTTP clients see (serialized)             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → ApiError → Client   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (label, id, amounts)
//! 3. Every variant maps to exactly one [`ErrorKind`]

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Error Kind
// =============================================================================

/// Stable error category reported to clients.
///
/// Every failure of an orchestrated call carries exactly one kind. Clients
/// branch on the kind, never on the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Caller identity missing or invalid.
    Unauthenticated,
    /// Caller is known but not allowed to run the operation.
    PermissionDenied,
    /// Malformed or out-of-range input.
    InvalidArgument,
    /// Referenced entity does not exist.
    NotFound,
    /// Entity exists but is in the wrong state for the operation.
    FailedPrecondition,
    /// The operation was already applied under this idempotency key.
    AlreadyExists,
    /// A bounded search (QR label generation) ran out of attempts.
    ResourceExhausted,
    /// Store failure or exhausted conflict retries.
    Internal,
}

impl ErrorKind {
    /// Machine-readable code, e.g. `FAILED_PRECONDITION`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "UNAUTHENTICATED",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations.
///
/// Raised by the pure state machines in this crate and by the orchestrator
/// after it has read the entities involved. None of these are retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A sale or checkout scanned a QR code that is not linked to a customer.
    ///
    /// ## When This Occurs
    /// - Code was never handed out (`unassigned`)
    /// - Code was voided or reported lost by an admin
    #[error("QR code {label} is {status}, expected assigned")]
    QrCodeNotAssigned { label: String, status: String },

    /// Registration attempted with a code that is already in use.
    #[error("QR code {label} is {status}, expected unassigned")]
    QrCodeUnavailable { label: String, status: String },

    /// The QR lifecycle does not allow this action from the current status.
    #[error("Cannot {action} QR code {label} while it is {status}")]
    InvalidQrTransition {
        label: String,
        status: String,
        action: &'static str,
    },

    /// Operator has no stall assignment.
    #[error("operator not assigned to a stall")]
    OperatorNotAssigned { operator_id: String },

    /// Operator's assigned stall differs from the stall involved in the request.
    #[error("Operator is assigned to stall {assigned}, not {requested}")]
    StallMismatch { assigned: String, requested: String },

    /// Refund would push total refunds past the original sale amount.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale 5000 ──► Refund 2000 ──► Refund 4000 (requested)
    ///                                    │
    ///                                    ▼
    ///             remaining = 5000 - 2000 = 3000 < 4000
    ///                                    │
    ///                                    ▼
    ///   "Refund amount exceeds remaining balance. Maximum refund: 3000"
    /// ```
    #[error("Refund amount exceeds remaining balance. Maximum refund: {max_refund_cents}")]
    RefundExceedsRemaining { max_refund_cents: i64 },

    /// The transaction named as the refund target cannot be refunded.
    #[error("Transaction {transaction_id} cannot be refunded: {reason}")]
    InvalidRefundTarget {
        transaction_id: String,
        reason: &'static str,
    },

    /// Checkout on an account that is already settled.
    #[error("Account {customer_id} is already paid")]
    AlreadyPaid { customer_id: String },

    /// Checkout amount must equal the outstanding balance exactly.
    #[error("Checkout amount {requested_cents} does not match balance {balance_cents}")]
    AmountMismatch {
        balance_cents: i64,
        requested_cents: i64,
    },

    /// Nothing to settle.
    #[error("Account {customer_id} has no outstanding balance")]
    NothingToSettle { customer_id: String },

    /// Cancellation supplied a key that does not match the original operation.
    #[error("idempotency key mismatch")]
    IdempotencyKeyMismatch,

    /// A sale that already has refunds against it cannot be cancelled.
    #[error("Transaction {transaction_id} has refunds and cannot be cancelled")]
    HasRefunds { transaction_id: String },

    /// Settlement entries are removed through payment cancellation only.
    #[error("Transaction {transaction_id} is a settlement entry; cancel the payment instead")]
    SettlementNotCancellable { transaction_id: String },

    /// Registration can only be undone before the customer has any activity.
    #[error("Customer {customer_id} has ledger activity and cannot be unregistered")]
    HasLedgerActivity { customer_id: String },

    /// Arithmetic on the balance would overflow.
    #[error("Balance overflow for account {customer_id}")]
    BalanceOverflow { customer_id: String },

    /// Non-admin caller invoked an admin operation.
    #[error("{action} requires the admin role")]
    PermissionDenied { action: &'static str },

    /// Label generation hit its collision bound.
    #[error("Could not generate a unique QR label after {attempts} attempts")]
    LabelSpaceExhausted { attempts: u32 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns the client-facing category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::QrCodeNotAssigned { .. }
            | CoreError::QrCodeUnavailable { .. }
            | CoreError::InvalidQrTransition { .. }
            | CoreError::OperatorNotAssigned { .. }
            | CoreError::StallMismatch { .. }
            | CoreError::RefundExceedsRemaining { .. }
            | CoreError::InvalidRefundTarget { .. }
            | CoreError::AlreadyPaid { .. }
            | CoreError::AmountMismatch { .. }
            | CoreError::NothingToSettle { .. }
            | CoreError::IdempotencyKeyMismatch
            | CoreError::HasRefunds { .. }
            | CoreError::SettlementNotCancellable { .. }
            | CoreError::HasLedgerActivity { .. } => ErrorKind::FailedPrecondition,
            CoreError::BalanceOverflow { .. } | CoreError::Validation(_) => {
                ErrorKind::InvalidArgument
            }
            CoreError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            CoreError::LabelSpaceExhausted { .. } => ErrorKind::ResourceExhausted,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when request fields don't meet requirements.
/// Raised before any store read, so they never leave partial effects.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Numeric value exceeds a hard cap.
    #[error("Maximum is {max}")]
    AboveMaximum { field: String, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad characters in a key).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refund_cap_message() {
        let err = CoreError::RefundExceedsRemaining {
            max_refund_cents: 3000,
        };
        assert_eq!(
            err.to_string(),
            "Refund amount exceeds remaining balance. Maximum refund: 3000"
        );
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "qrCodeId".to_string(),
        };
        assert_eq!(err.to_string(), "qrCodeId is required");

        let err = ValidationError::AboveMaximum {
            field: "count".to_string(),
            max: 500,
        };
        assert_eq!(err.to_string(), "Maximum is 500");
    }

    #[test]
    fn test_validation_converts_to_invalid_argument() {
        let core_err: CoreError = ValidationError::MustBePositive {
            field: "amountCents".to_string(),
        }
        .into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            CoreError::not_found("Customer", "c-1").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::PermissionDenied { action: "void" }.kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            CoreError::LabelSpaceExhausted { attempts: 8 }.kind(),
            ErrorKind::ResourceExhausted
        );
        assert_eq!(
            CoreError::IdempotencyKeyMismatch.to_string(),
            "idempotency key mismatch"
        );
    }

    #[test]
    fn test_error_kind_codes() {
        assert_eq!(ErrorKind::FailedPrecondition.as_str(), "FAILED_PRECONDITION");
        assert_eq!(
            serde_json::to_string(&ErrorKind::AlreadyExists).unwrap(),
            "\"ALREADY_EXISTS\""
        );
    }
}
