//! # lipabill-api — Binary Entry Point
//!
//! Starts the Axum HTTP server. Binds to a configurable port
//! (default 8080).

use std::sync::Arc;

use lipabill_api::state::{AppConfig, AppState};
use lipabill_api::store::{self, BillingStore, MemoryStore, PgStore};
use lipabill_daraja::{DarajaConfig, HttpStkGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Build configuration from environment.
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let auth_token = std::env::var("AUTH_TOKEN").ok();
    if auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set — development mode, bearer tokens are bare user ids");
    }
    let config = AppConfig { port, auth_token };

    // Initialize the store (optional Postgres — absent means in-memory).
    let pool = store::postgres::init_pool().await.map_err(|e| {
        tracing::error!("Database initialization failed: {e}");
        e
    })?;
    let persistent = pool.is_some();
    let store: Arc<dyn BillingStore> = match pool {
        Some(pool) => Arc::new(PgStore::new(pool)),
        None => Arc::new(MemoryStore::new()),
    };

    // The Daraja client is required: without credentials no payment can
    // be initiated.
    let daraja_config = DarajaConfig::from_env().map_err(|e| {
        tracing::error!("Daraja configuration failed: {e}");
        e
    })?;
    tracing::info!(environment = ?daraja_config.environment, "Daraja client configured");
    let gateway = Arc::new(HttpStkGateway::new(daraja_config)?);

    let state = AppState::new(store, gateway, config, persistent);
    let app = lipabill_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("lipabill API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
