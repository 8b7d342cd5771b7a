//! Shared application state.

use std::sync::Arc;

use lipabill_daraja::StkGateway;

use crate::store::BillingStore;

/// Service configuration, assembled from the environment in `main`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listening port (`PORT`, default 8080).
    pub port: u16,
    /// Shared bearer secret (`AUTH_TOKEN`). `None` enables development
    /// mode where the bearer token is just the user id.
    pub auth_token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
        }
    }
}

/// State shared by all request handlers.
///
/// Both the store and the gateway sit behind trait objects so tests can
/// substitute in-memory and scripted implementations.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BillingStore>,
    pub gateway: Arc<dyn StkGateway>,
    pub config: AppConfig,
    /// Whether a Postgres pool backs the store. Reported by readiness.
    pub persistent: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BillingStore>,
        gateway: Arc<dyn StkGateway>,
        config: AppConfig,
        persistent: bool,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
            persistent,
        }
    }
}
