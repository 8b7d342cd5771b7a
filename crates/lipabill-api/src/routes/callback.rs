//! # Provider Callback Webhook
//!
//! Receives the asynchronous STK Push result from Daraja and applies it
//! via the reconciler. Unauthenticated; mounted outside the auth
//! middleware. Malformed payloads are rejected at the parse boundary
//! with 400 and no state change.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use lipabill_daraja::CallbackEnvelope;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::reconciler::{self, ReconcileOutcome};
use crate::state::AppState;

/// Acknowledgement returned to the provider on a handled callback.
#[derive(Debug, Serialize, ToSchema)]
pub struct CallbackAck {
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/callback", post(callback))
}

#[utoipa::path(
    post,
    path = "/callback",
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Callback applied", body = CallbackAck),
        (status = 400, description = "Malformed payload, or payment failed", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown payment reference", body = crate::error::ErrorBody),
        (status = 409, description = "Payment already reconciled", body = crate::error::ErrorBody),
    ),
    tag = "callback"
)]
pub async fn callback(
    State(state): State<AppState>,
    body: Result<Json<CallbackEnvelope>, JsonRejection>,
) -> Result<Json<CallbackAck>, AppError> {
    let envelope = body
        .map(|Json(envelope)| envelope)
        .map_err(|err| AppError::InvalidCallback(err.body_text()))?;
    let stk_callback = envelope.body.stk_callback;

    match reconciler::reconcile(state.store.as_ref(), &stk_callback).await? {
        ReconcileOutcome::Completed(payment) => Ok(Json(CallbackAck {
            message: format!(
                "payment {} completed",
                payment.mpesa_receipt_number.as_deref().unwrap_or(&payment.payment_reference)
            ),
        })),
        // The provider reported a failed payment; the failure was
        // recorded, and the response carries the provider's description.
        ReconcileOutcome::Failed { result_desc, .. } => {
            Err(AppError::PaymentFailed(result_desc))
        }
    }
}
