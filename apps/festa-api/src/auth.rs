//! Bearer-token authentication.
//!
//! Every `/v1` handler takes an [`Authenticated`] argument; extraction fails
//! with 401 before the handler body runs.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::warn;

use festa_ledger::{extract_bearer_token, Caller};

use crate::error::ApiError;
use crate::AppState;

/// The verified caller of a request.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Caller>() {
            return Ok(Authenticated(caller.clone()));
        }

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::unauthenticated("missing authorization header"))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::unauthenticated("expected a bearer token"))?;

        let caller = state.jwt.verify(token).map_err(|e| {
            warn!(uri = %parts.uri, error = %e, "Rejected bearer token");
            ApiError::from(e)
        })?;

        parts.extensions.insert(caller.clone());
        Ok(Authenticated(caller))
    }
}
