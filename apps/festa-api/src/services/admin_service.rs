//! Admin handlers. Role checks happen in `LedgerService`; a non-admin
//! caller gets 403 from there.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use festa_core::{
    AssignOperatorRequest, Assignment, CreateStallRequest, GenerateQrBatchRequest, LiveStats,
    QrBatchResult, QrCode, ReissueQrRequest, ReissueResult, Stall,
};

use crate::auth::Authenticated;
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Body of `POST /v1/customers/{id}/reissue-qr`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReissueBody {
    pub new_label: String,
}

/// Body of `PUT /v1/assignments/{operatorId}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentBody {
    pub stall_id: String,
    pub user_name: String,
}

pub async fn generate_qr_batch(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<GenerateQrBatchRequest>,
) -> ApiResult<QrBatchResult> {
    Ok(Json(state.service.generate_qr_batch(&caller, req).await?))
}

pub async fn void_qr(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(label): Path<String>,
) -> ApiResult<QrCode> {
    Ok(Json(state.service.void_qr(&caller, &label).await?))
}

pub async fn mark_qr_lost(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(label): Path<String>,
) -> ApiResult<QrCode> {
    Ok(Json(state.service.mark_qr_lost(&caller, &label).await?))
}

pub async fn reissue_qr(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(customer_id): Path<String>,
    ApiJson(body): ApiJson<ReissueBody>,
) -> ApiResult<ReissueResult> {
    let req = ReissueQrRequest {
        customer_id,
        new_label: body.new_label,
    };
    Ok(Json(state.service.reissue_qr(&caller, req).await?))
}

pub async fn create_stall(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    ApiJson(req): ApiJson<CreateStallRequest>,
) -> ApiResult<Stall> {
    Ok(Json(state.service.create_stall(&caller, req).await?))
}

pub async fn assign_operator(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    Path(operator_id): Path<String>,
    ApiJson(body): ApiJson<AssignmentBody>,
) -> ApiResult<Assignment> {
    let req = AssignOperatorRequest {
        operator_id,
        stall_id: body.stall_id,
        user_name: body.user_name,
    };
    Ok(Json(state.service.assign_operator(&caller, req).await?))
}

pub async fn rebuild_live_stats(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<LiveStats> {
    Ok(Json(state.service.rebuild_live_stats(&caller).await?))
}

pub async fn update_top_stall(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
) -> ApiResult<LiveStats> {
    Ok(Json(state.service.update_top_stall(&caller).await?))
}
