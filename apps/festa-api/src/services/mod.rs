//! HTTP handlers and the route table.

pub mod admin_service;
pub mod health_service;
pub mod ledger_service;

use axum::routing::{get, post, put};
use axum::Router;

use crate::AppState;

/// Builds the full route table.
pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        // Ledger operations
        .route("/sales", post(ledger_service::process_sale))
        .route("/refunds", post(ledger_service::process_refund))
        .route("/checkouts", post(ledger_service::process_checkout))
        .route("/customers", post(ledger_service::create_customer))
        .route("/customers/{id}", get(ledger_service::get_customer))
        .route("/transactions/cancel", post(ledger_service::cancel_transaction))
        .route("/payments/cancel", post(ledger_service::cancel_payment))
        .route("/registrations/cancel", post(ledger_service::cancel_registration))
        .route("/live-stats", get(ledger_service::live_stats))
        // Admin
        .route("/qr-batches", post(admin_service::generate_qr_batch))
        .route("/qr-codes/{label}/void", post(admin_service::void_qr))
        .route("/qr-codes/{label}/lost", post(admin_service::mark_qr_lost))
        .route("/customers/{id}/reissue-qr", post(admin_service::reissue_qr))
        .route("/stalls", post(admin_service::create_stall))
        .route("/assignments/{operator_id}", put(admin_service::assign_operator))
        .route("/admin/live-stats/rebuild", post(admin_service::rebuild_live_stats))
        .route("/admin/live-stats/top-stall", post(admin_service::update_top_stall));

    Router::new()
        .route("/health", get(health_service::check))
        .nest("/v1", v1)
        .with_state(state)
}
