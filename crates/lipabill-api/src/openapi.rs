//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Bearer token in the form {user_id}:{secret}; \
                             the secret is set via the AUTH_TOKEN env var.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "lipabill API — M-Pesa Bill Payments",
        version = "0.3.2",
        description = "Bill-payment backend over M-Pesa STK Push.\n\nClients initiate payments against their bills (`/pay`, `/pay-multiple`, `/pay-all`); Safaricom delivers the asynchronous result to the `/callback` webhook, which reconciles the payment and its bill transactionally and idempotently.\n\nAuthentication: `Authorization: Bearer {user_id}:{secret}`. The callback and health probes are unauthenticated.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        crate::routes::payments::pay,
        crate::routes::payments::pay_multiple,
        crate::routes::payments::pay_all,
        crate::routes::history::history,
        crate::routes::callback::callback,
    ),
    components(schemas(
        lipabill_core::Bill,
        lipabill_core::BillStatus,
        lipabill_core::Payment,
        lipabill_core::PaymentStatus,
        lipabill_core::PaymentInstruction,
        crate::routes::payments::PayRequest,
        crate::routes::payments::PayMultipleRequest,
        crate::routes::callback::CallbackAck,
        crate::routes::history::HistoryEntry,
        crate::orchestrator::BatchOutcome,
        crate::orchestrator::BillFailure,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "payments", description = "Payment initiation and history"),
        (name = "callback", description = "Provider result webhook"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
