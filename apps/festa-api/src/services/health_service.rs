//! Liveness check for monitoring.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServingStatus {
    Serving,
    NotServing,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResponse {
    pub status: ServingStatus,
    pub message: String,
    pub server_time: String,
}

/// `GET /health`: 200 when the database answers, 503 otherwise.
pub async fn check(State(state): State<AppState>) -> (StatusCode, Json<HealthCheckResponse>) {
    let (code, status, message) = if state.db.health_check().await {
        (StatusCode::OK, ServingStatus::Serving, "Database connected")
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            ServingStatus::NotServing,
            "Database unreachable",
        )
    };

    let response = HealthCheckResponse {
        status,
        message: message.to_string(),
        server_time: Utc::now().to_rfc3339(),
    };
    (code, Json(response))
}
