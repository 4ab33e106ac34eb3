//! # Festa API
//!
//! HTTP/JSON surface of the Festa ledger.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Festa API Routes                             │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │ Ledger         │  │ Cancellations  │  │  Admin                     ││
//! │  │                │  │                │  │                            ││
//! │  │ • /v1/sales    │  │ • transactions │  │ • /v1/qr-batches           ││
//! │  │ • /v1/refunds  │  │ • payments     │  │ • /v1/qr-codes/{label}/..  ││
//! │  │ • /v1/checkouts│  │ • registrations│  │ • /v1/stalls, assignments  ││
//! │  │ • /v1/customers│  │                │  │ • /v1/admin/live-stats/..  ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  Bearer JWT on every /v1 route  ──►  Caller  ──►  LedgerService        │
//! │  Errors: {"code": "FAILED_PRECONDITION", "message": "..."}             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Read by `LedgerConfig::load`: `festa.toml` (or `$FESTA_CONFIG`), then
//! `FESTA_*` environment variables. Logging honours `RUST_LOG`.

pub mod auth;
pub mod error;
pub mod extract;
pub mod services;


use festa_db::Database;
use festa_ledger::{JwtManager, LedgerService};

// Re-exports
pub use error::ApiError;
pub use services::router;

/// Shared application state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: LedgerService,
    pub jwt: JwtManager,
    pub db: Database,
}

impl AppState {
    pub fn new(service: LedgerService, jwt: JwtManager) -> Self {
        let db = service.database().clone();
        AppState { service, jwt, db }
    }
}
