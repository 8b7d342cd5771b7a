//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from the store, the orchestrator, and the Daraja
//! client to HTTP status codes. Returns JSON error response bodies with
//! error code, message, and details. Never exposes internal error details
//! in production responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lipabill_daraja::DarajaError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::store::StoreError;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API
/// surface. The `details` field carries additional context for client
/// errors but is omitted for 500-class errors to prevent information
/// leakage.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
///
/// Maps domain errors to appropriate HTTP status codes and structured
/// JSON error bodies. Internal and upstream infrastructure details are
/// never exposed to clients.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found, or not owned by the caller (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request body failed business validation (400).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Callback payload is missing required fields or malformed (400).
    /// No state change has occurred.
    #[error("invalid callback: {0}")]
    InvalidCallback(String),

    /// The provider reported the payment failed; carries the provider's
    /// `ResultDesc` back to the webhook caller (400).
    #[error("payment failed: {0}")]
    PaymentFailed(String),

    /// Authentication failure, missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The payment has already reached a terminal state and the
    /// transition cannot be reapplied (409).
    #[error("already reconciled: {0}")]
    AlreadyReconciled(String),

    /// Referential integrity violation discovered during reconciliation,
    /// e.g. a payment whose bill no longer exists (404). The surrounding
    /// transaction has been rolled back.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Provider credential exchange failed (502). Detail is logged, not
    /// returned.
    #[error("upstream auth failure: {0}")]
    UpstreamAuth(String),

    /// Provider unreachable or returned a transport-level failure (502).
    /// Detail is logged, not returned.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The provider rejected the initiation at the business level (502).
    /// The provider's reason is safe to return to the caller.
    #[error("payment initiation rejected: {0}")]
    UpstreamRejected(String),

    /// Internal server error (500). Message is logged but not returned
    /// to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::InvalidCallback(_) => (StatusCode::BAD_REQUEST, "INVALID_CALLBACK"),
            Self::PaymentFailed(_) => (StatusCode::BAD_REQUEST, "PAYMENT_FAILED"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::AlreadyReconciled(_) => (StatusCode::CONFLICT, "ALREADY_RECONCILED"),
            Self::Integrity(_) => (StatusCode::NOT_FOUND, "INTEGRITY_ERROR"),
            Self::UpstreamAuth(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_AUTH_FAILURE"),
            Self::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            Self::UpstreamRejected(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_REJECTED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal or upstream infrastructure details to
        // clients. Business-level provider rejections are safe to surface.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::UpstreamAuth(_) | Self::Upstream(_) => {
                "An upstream payment provider error occurred".to_string()
            }
            other => other.to_string(),
        };

        // Log server-side errors for operator visibility.
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::UpstreamAuth(_) | Self::Upstream(_) => {
                tracing::error!(error = %self, "upstream provider error")
            }
            Self::UpstreamRejected(_) => tracing::warn!(error = %self, "provider rejected initiation"),
            Self::Integrity(_) => tracing::error!(error = %self, "integrity error during reconciliation"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert domain validation errors to API errors.
impl From<lipabill_core::ValidationError> for AppError {
    fn from(err: lipabill_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Convert store errors to API errors.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::PaymentNotFound(_) => Self::NotFound(err.to_string()),
            StoreError::BillMissing(_) => Self::Integrity(err.to_string()),
            StoreError::AlreadyReconciled { .. } => Self::AlreadyReconciled(err.to_string()),
            StoreError::Database(_) => Self::Internal(err.to_string()),
        }
    }
}

/// Convert Daraja infrastructure failures to API errors.
///
/// Business-level rejections never take this path — they arrive as
/// `StkOutcome::Rejected` values, not errors.
impl From<DarajaError> for AppError {
    fn from(err: DarajaError) -> Self {
        match &err {
            DarajaError::AuthFailure { .. } => Self::UpstreamAuth(err.to_string()),
            DarajaError::RequestFailure { .. } | DarajaError::Timeout { .. } => {
                Self::Upstream(err.to_string())
            }
            DarajaError::NotConfigured { .. } => Self::Internal(err.to_string()),
        }
    }
}
