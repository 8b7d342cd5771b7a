//! # Payment History API
//!
//! Read-only projection of the caller's most recent payments, each
//! joined with its bill when the bill still exists.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use lipabill_core::{Bill, Payment};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 5;
const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryParams {
    /// Maximum number of payments to return (default 5, capped at 50).
    pub limit: Option<usize>,
}

/// One history entry: a payment and, when still present, its bill.
#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntry {
    pub payment: Payment,
    pub bill: Option<Bill>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/history", get(history))
}

#[utoipa::path(
    get,
    path = "/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Most recent payments, newest first", body = [HistoryEntry]),
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn history(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let entries = state
        .store
        .recent_payments(caller.user_id, limit)
        .await?
        .into_iter()
        .map(|(payment, bill)| HistoryEntry { payment, bill })
        .collect();
    Ok(Json(entries))
}
