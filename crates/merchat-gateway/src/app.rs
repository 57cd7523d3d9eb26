use std::sync::Arc;

use axum::{routing::get, Router};
use merchat_core::config::MerchatConfig;
use merchat_store::CredentialStore;
use merchat_supervisor::Supervisor;

/// Shared state handed to every admin HTTP handler (§4.13).
pub struct AppState {
    pub config: MerchatConfig,
    pub store: Arc<CredentialStore>,
    pub supervisor: Arc<Supervisor>,
}

impl AppState {
    pub fn new(config: MerchatConfig, store: Arc<CredentialStore>, supervisor: Arc<Supervisor>) -> Self {
        Self { config, store, supervisor }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/accounts", get(crate::http::accounts::accounts_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
