//! HTTP surface for the ledger.
//!
//! Four mutation endpoints plus a health probe. Errors become a JSON
//! body `{"code", "error"}`; the code comes from the engine's error
//! taxonomy and the status from the mapping here.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

use crate::auth::{Caller, IdentityVerifier};
use crate::engine::{AdjustError, Ledger, RedeemError, SettleError, TransferError};
use crate::model::{
    AdjustOutcome, AdjustRequest, RedeemOutcome, RedeemRequest, SettleOutcome, SettlementEvent,
    TransferOutcome, TransferRequest,
};

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub identity: Arc<dyn IdentityVerifier>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/settlement", post(settlement))
        .route("/voucher", post(voucher))
        .route("/transfer", post(transfer))
        .route("/admin/adjust", post(adjust))
        .with_state(state)
}

/// Error payload: machine-readable code plus a short human message.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn unauthorized() -> Self {
        ApiError {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthorized",
            message: "missing or invalid credential".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Status for a taxonomy code; anything unknown is a server error.
fn status_for(code: &str) -> StatusCode {
    match code {
        "bad_request" | "amount_out_of_range" | "self_transfer" | "invalid_code" => {
            StatusCode::BAD_REQUEST
        }
        "unauthorized" | "invalid_signature" => StatusCode::UNAUTHORIZED,
        "forbidden" => StatusCode::FORBIDDEN,
        "account_not_found" | "sender_not_found" | "recipient_not_found" => StatusCode::NOT_FOUND,
        "insufficient_balance" | "conflict" => StatusCode::CONFLICT,
        "unavailable" | "audit_failed" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

macro_rules! impl_api_error_from {
    ($($err:ty),+) => {
        $(impl From<$err> for ApiError {
            fn from(e: $err) -> Self {
                let code = e.code();
                ApiError {
                    status: status_for(code),
                    code,
                    message: e.to_string(),
                }
            }
        })+
    };
}

impl_api_error_from!(SettleError, RedeemError, TransferError, AdjustError);

/// Resolve the bearer credential into a verified caller.
async fn caller(state: &AppState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(ApiError::unauthorized)?;
    state
        .identity
        .verify(credential)
        .await
        .map_err(|_| ApiError::unauthorized())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn settlement(
    State(state): State<AppState>,
    Json(event): Json<SettlementEvent>,
) -> Result<Json<SettleOutcome>, ApiError> {
    Ok(Json(state.ledger.settle(event).await?))
}

async fn voucher(
    State(state): State<AppState>,
    Json(request): Json<RedeemRequest>,
) -> Result<Json<RedeemOutcome>, ApiError> {
    Ok(Json(state.ledger.redeem(request).await?))
}

async fn transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferOutcome>, ApiError> {
    let caller = caller(&state, &headers).await?;
    let TransferRequest {
        to_account_id,
        amount,
    } = request;
    Ok(Json(
        state
            .ledger
            .transfer(caller.account, to_account_id, amount)
            .await?,
    ))
}

async fn adjust(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<AdjustOutcome>, ApiError> {
    let caller = caller(&state, &headers).await?;
    Ok(Json(state.ledger.adjust(&caller, request).await?))
}
