//! HTTP Gateway
//!
//! Thin axum surface over the transfer service and the ledger audit.

pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::GatewayConfig;
use state::AppState;

/// Build the gateway router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .route("/api/v1/transfer", post(handlers::create_transfer))
        .route("/api/v1/audit", get(handlers::run_audit))
        .with_state(state)
}

/// Start HTTP Gateway server
///
/// Serves until `shutdown` flips to true, then drains in-flight requests.
pub async fn run_server(
    config: &GatewayConfig,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        tracing::error!(addr = %addr, error = %e, "Failed to bind gateway");
        e
    })?;

    tracing::info!("Gateway listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            tracing::info!("Gateway shutting down");
        })
        .await
}
