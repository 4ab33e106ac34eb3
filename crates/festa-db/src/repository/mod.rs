//! # Repository Module
//!
//! One repository per document collection.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repositories Borrow the Transaction                  │
//! │                                                                         │
//! │  StoreTx                                                               │
//! │    │                                                                    │
//! │    │  tx.customers().get_by_qr_code("QR-000042")                       │
//! │    │  ↓                                                                 │
//! │    ▼                                                                    │
//! │  CustomerRepository<'tx> { conn: &mut SqliteConnection }               │
//! │  ├── get / get_by_qr_code                                              │
//! │  ├── insert                                                            │
//! │  └── update_account (version-guarded)                                  │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite (inside the open transaction)                                  │
//! │                                                                         │
//! │  A repository cannot outlive its transaction, so no write can escape  │
//! │  the atomic unit it belongs to.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CustomerRepository`] - Customers and their embedded accounts
//! - [`TransactionRepository`] - Sale, refund and settlement entries
//! - [`PaymentRepository`] - Checkout payments
//! - [`RegistrationRepository`] - Customer sign-ups
//! - [`QrCodeRepository`] - QR codes and batches
//! - [`AssignmentRepository`] - Operator → stall assignments
//! - [`StallRepository`] - Stalls and their projected totals
//! - [`IdempotencyRepository`] - Write-once idempotency records
//! - [`LiveStatsRepository`] - The global statistics document

pub mod assignment;
pub mod customer;
pub mod idempotency;
pub mod live_stats;
pub mod payment;
pub mod qr_code;
pub mod registration;
pub mod stall;
pub mod transaction;

pub use assignment::AssignmentRepository;
pub use customer::CustomerRepository;
pub use idempotency::IdempotencyRepository;
pub use live_stats::{LiveStatsRepository, StatsDelta};
pub use payment::PaymentRepository;
pub use qr_code::QrCodeRepository;
pub use registration::RegistrationRepository;
pub use stall::StallRepository;
pub use transaction::{StallRevenue, TransactionRepository, TransactionTotals};
