//! # festa-db: Store Layer for the Festa Ledger
//!
//! SQLite persistence for the ledger, with sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Festa Ledger Data Flow                           │
//! │                                                                         │
//! │  LedgerService::process_sale (festa-ledger)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     festa-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ CustomerRepo  │    │ 001_ledger_  │  │   │
//! │  │   │ begin()       │───►│ QrCodeRepo    │    │   schema.sql │  │   │
//! │  │   │   → StoreTx   │    │ ...           │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`tx`] - The store transaction handed to every ledger operation
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types, conflict classification
//! - [`repository`] - One repository per collection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use festa_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("festa.db")).await?;
//!
//! let mut tx = db.begin().await?;
//! let customer = tx.customers().get_by_qr_code("QR-000042").await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod tx;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use tx::StoreTx;

pub use repository::{
    AssignmentRepository, CustomerRepository, IdempotencyRepository, LiveStatsRepository,
    PaymentRepository, QrCodeRepository, RegistrationRepository, StallRepository, StallRevenue,
    StatsDelta, TransactionRepository, TransactionTotals,
};
