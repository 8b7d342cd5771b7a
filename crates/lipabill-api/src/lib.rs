//! # lipabill-api — Bill-Payment API Service
//!
//! Axum service bridging synchronous client requests with Safaricom's
//! asynchronous STK Push protocol: clients trigger payments against
//! their bills, the payer approves on-device, and the provider's webhook
//! reconciles payment and bill state.
//!
//! ## API Surface
//!
//! | Route            | Module                  | Auth    |
//! |------------------|-------------------------|---------|
//! | `POST /pay`      | [`routes::payments`]    | bearer  |
//! | `POST /pay-multiple` | [`routes::payments`]| bearer  |
//! | `POST /pay-all`  | [`routes::payments`]    | bearer  |
//! | `GET /history`   | [`routes::history`]     | bearer  |
//! | `POST /callback` | [`routes::callback`]    | none (provider webhook) |
//! | `GET /health/*`  | liveness/readiness      | none    |
//! | `GET /openapi.json` | [`openapi`]          | none    |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod orchestrator;
pub mod reconciler;
pub mod routes;
pub mod state;
pub mod store;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// The provider callback and health probes are mounted outside the auth
/// middleware: Daraja cannot present this service's bearer token, and
/// probes must work without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    // Authenticated API routes. Body size limit 1 MiB; every request
    // body on this surface is a handful of identifiers.
    let api = Router::new()
        .merge(routes::payments::router())
        .merge(routes::history::router())
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .merge(routes::callback::router())
        .merge(openapi::router())
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /health/liveness — process is up.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// GET /health/readiness — ready to take traffic; reports whether the
/// store is persistent or in-memory.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "store": if state.persistent { "postgres" } else { "memory" },
            "gateway": state.gateway.gateway_name(),
        })),
    )
}
