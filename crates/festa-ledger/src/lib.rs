//! # festa-ledger: Transaction Orchestrator for the Festa Ledger
//!
//! Every ledger operation (sale, refund, checkout, registration and their
//! cancellations) runs here as one atomic unit of work against the store.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Ledger Orchestration                            │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  LedgerService (service/)                        │  │
//! │  │                                                                  │  │
//! │  │  validate ─► run_in_transaction ─► commit ─► publish events     │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  Idempotency   │  │  QR Registry   │  │  Assignment Resolver   │    │
//! │  │                │  │                │  │                        │    │
//! │  │ First read and │  │ Labels, batch  │  │ Operator ─► stall      │    │
//! │  │ last write of  │  │ generation,    │  │ authorization          │    │
//! │  │ each unit      │  │ lifecycle      │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Aggregate Projector                           │   │
//! │  │                                                                 │   │
//! │  │ Background task fed with committed events                       │   │
//! │  │ Maintains stall totals and the live stats document              │   │
//! │  │ Full rebuild from the ledger on demand or on a timer            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`service`] - `LedgerService`, one method per operation
//! - [`retry`] - Conflict retry around a store transaction
//! - [`idempotency`] - Replay detection and cached results
//! - [`qr_registry`] - QR label generation and lifecycle
//! - [`assignment`] - Operator to stall resolution
//! - [`projector`] - Derived aggregates
//! - [`auth`] - Caller identity from bearer tokens
//! - [`config`] - TOML configuration with env overrides
//! - [`error`] - Ledger error type
//!
//! ## Usage
//!
//! ```rust,ignore
//! use festa_db::Database;
//! use festa_ledger::{Caller, LedgerConfig, LedgerService};
//!
//! let config = LedgerConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//! let (service, projector_task) = LedgerService::start(db, &config);
//!
//! let outcome = service.process_sale(&caller, request).await?;
//! if !outcome.is_processed() {
//!     println!("replayed: {:?}", outcome.result());
//! }
//!
//! service.shutdown().await;
//! projector_task.await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod assignment;
pub mod auth;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod projector;
pub mod qr_registry;
pub mod retry;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{extract_bearer_token, Caller, Claims, JwtManager};
pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use idempotency::Outcome;
pub use projector::{LedgerEvent, ProjectorHandle};
pub use retry::RetryPolicy;
pub use service::LedgerService;
