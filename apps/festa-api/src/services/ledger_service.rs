//! Ledger operation handlers.
//!
//! Replays answer 200 with `{"status": "already_processed", "result": ...}`,
//! so a client retrying after a timeout can treat both outcomes alike.

use axum::extract::{Path, State};
use axum::Json;

use festa_core::{
    CancelPaymentRequest, CancelRegistrationRequest, CancelResult, CancelTransactionRequest,
    CheckoutResult, CreateCustomerRequest, Customer, LiveStats, ProcessCheckoutRequest,
    ProcessRefundRequest, ProcessSaleRequest, RefundResult, SaleResult,
};
use festa_ledger::Outcome;

use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn process_sale(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<ProcessSaleRequest>,
) -> ApiResult<Outcome<SaleResult>> {
    Ok(Json(state.service.process_sale(&caller, req).await?))
}

pub async fn process_refund(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<ProcessRefundRequest>,
) -> ApiResult<Outcome<RefundResult>> {
    Ok(Json(state.service.process_refund(&caller, req).await?))
}

pub async fn process_checkout(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<ProcessCheckoutRequest>,
) -> ApiResult<Outcome<CheckoutResult>> {
    Ok(Json(state.service.process_checkout(&caller, req).await?))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<CreateCustomerRequest>,
) -> ApiResult<Outcome<Customer>> {
    Ok(Json(state.service.create_customer(&caller, req).await?))
}

pub async fn cancel_transaction(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<CancelTransactionRequest>,
) -> ApiResult<CancelResult> {
    Ok(Json(state.service.cancel_transaction(&caller, req).await?))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<CancelPaymentRequest>,
) -> ApiResult<CancelResult> {
    Ok(Json(state.service.cancel_payment(&caller, req).await?))
}

pub async fn cancel_registration(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<CancelRegistrationRequest>,
) -> ApiResult<CancelResult> {
    Ok(Json(state.service.cancel_registration(&caller, req).await?))
}

// =============================================================================
// Reads
// =============================================================================

pub async fn get_customer(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
    Path(customer_id): Path<String>,
) -> ApiResult<Customer> {
    Ok(Json(state.service.get_customer(&customer_id).await?))
}

pub async fn live_stats(
    State(state): State<AppState>,
    Authenticated(_caller): Authenticated,
) -> ApiResult<LiveStats> {
    Ok(Json(state.service.live_stats().await?))
}
