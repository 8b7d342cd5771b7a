//! # Payment Initiation API
//!
//! Endpoints that turn a "pay" request into an STK Push prompt on the
//! payer's phone: single bill, explicit multi-bill, and all pending
//! bills. The actual state transitions happen later, when the provider
//! delivers its callback.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use lipabill_core::Payment;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::orchestrator::{self, BatchOutcome};
use crate::state::AppState;

/// Request to pay a single bill.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PayRequest {
    /// The bill to pay. Must belong to the caller.
    pub bill_id: Uuid,
}

/// Request to pay an explicit set of bills.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PayMultipleRequest {
    #[serde(default)]
    pub bill_ids: Vec<Uuid>,
}

impl Validate for PayMultipleRequest {
    fn validate(&self) -> Result<(), String> {
        if self.bill_ids.is_empty() {
            return Err("bill_ids must be non-empty".into());
        }
        if self.bill_ids.len() > 100 {
            return Err(format!(
                "too many bills in one batch: {} (max 100)",
                self.bill_ids.len()
            ));
        }
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pay", post(pay))
        .route("/pay-multiple", post(pay_multiple))
        .route("/pay-all", post(pay_all))
}

#[utoipa::path(
    post,
    path = "/pay",
    request_body = PayRequest,
    responses(
        (status = 200, description = "STK prompt accepted; payment pending", body = Payment),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 404, description = "Bill not found or not owned", body = crate::error::ErrorBody),
        (status = 502, description = "Provider rejected or unreachable", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn pay(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<PayRequest>, JsonRejection>,
) -> Result<Json<Payment>, AppError> {
    let req = extract_json(body)?;
    let payment = orchestrator::pay_one(
        state.store.as_ref(),
        state.gateway.as_ref(),
        caller.user_id,
        req.bill_id,
    )
    .await?;
    Ok(Json(payment))
}

#[utoipa::path(
    post,
    path = "/pay-multiple",
    request_body = PayMultipleRequest,
    responses(
        (status = 200, description = "Batch initiated, possibly partially", body = BatchOutcome),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 404, description = "Some bills not found or not owned", body = crate::error::ErrorBody),
        (status = 502, description = "No bill could be initiated", body = BatchOutcome),
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn pay_multiple(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<PayMultipleRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let req = extract_validated_json(body)?;
    let outcome = orchestrator::pay_multiple(
        state.store.as_ref(),
        state.gateway.as_ref(),
        caller.user_id,
        &req.bill_ids,
    )
    .await?;
    Ok(batch_response(outcome))
}

#[utoipa::path(
    post,
    path = "/pay-all",
    responses(
        (status = 200, description = "Batch initiated, possibly partially", body = BatchOutcome),
        (status = 404, description = "No pending bills", body = crate::error::ErrorBody),
        (status = 502, description = "No bill could be initiated", body = BatchOutcome),
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn pay_all(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Response, AppError> {
    let outcome = orchestrator::pay_all(
        state.store.as_ref(),
        state.gateway.as_ref(),
        caller.user_id,
    )
    .await?;
    Ok(batch_response(outcome))
}

/// Partial success is 200; a batch where nothing succeeded is an overall
/// failure (502), with the same structured body either way.
fn batch_response(outcome: BatchOutcome) -> Response {
    let status = if outcome.is_total_failure() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    (status, Json(outcome)).into_response()
}
