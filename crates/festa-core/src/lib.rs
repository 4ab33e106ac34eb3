//! # festa-core: Pure Domain Logic for the Festa Ledger
//!
//! This crate holds every rule of the ledger that can be expressed without
//! touching the store: money arithmetic, the account state machine, QR label
//! rules and the typed request schemas accepted by the orchestrator.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Festa Ledger Architecture                        │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    festa-api (HTTP/JSON)                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │      festa-ledger (orchestrator, idempotency, projector)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ festa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  account  │  │    qr     │  │ requests  │  │   │
//! │  │   │ Customer  │  │  Account  │  │  labels   │  │ Sale/Ref. │  │   │
//! │  │   │ Payment   │  │  status   │  │ lifecycle │  │ Checkout  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    festa-db (SQLite store)                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Ledger entities (Customer, LedgerTransaction, Payment, QrCode, ...)
//! - [`account`] - Account balance/status state machine
//! - [`money`] - Integer-cents money type
//! - [`qr`] - QR label format and lifecycle transitions
//! - [`requests`] - Typed request schemas and operation results
//! - [`validation`] - Field validators
//! - [`error`] - Domain error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use festa_core::{Account, AccountStatus, Money};
//!
//! let mut account = Account::new();
//! account.apply_sale(Money::from_cents(5000)).unwrap();
//! assert_eq!(account.status, AccountStatus::Unpaid);
//!
//! account.apply_refund(Money::from_cents(2000)).unwrap();
//! assert_eq!(account.balance_cents, 3000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod account;
pub mod error;
pub mod money;
pub mod qr;
pub mod requests;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use account::{Account, AccountStatus};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use requests::*;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest amount accepted for a single sale, refund or checkout.
///
/// ## Business Reason
/// A mistyped amount (an extra zero or two) should be rejected at the
/// boundary instead of landing in a customer's balance.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000;

/// Maximum number of QR codes generated by one batch request.
pub const MAX_QR_BATCH_SIZE: i64 = 500;

/// Idempotency keys shorter than this are rejected.
///
/// ## Business Reason
/// Keys are client-generated. Very short keys collide across devices and
/// would silently swallow unrelated operations.
pub const MIN_IDEMPOTENCY_KEY_LEN: usize = 8;

/// Idempotency keys longer than this are rejected.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;
