//! HTTP health endpoint

use std::future::Future;

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use relaycraft_relay::{RelayMonitor, RelayStatus};

use crate::Result;

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(flatten)]
    pub relay: RelayStatus,
}

async fn health(State(monitor): State<RelayMonitor>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        relay: monitor.status(),
    })
}

/// Routes for the health surface. Anything else is a 404.
pub fn router(monitor: RelayMonitor) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .with_state(monitor)
}

/// Serve the health endpoint on `listener` until `shutdown` resolves
pub async fn serve_health<F>(listener: TcpListener, monitor: RelayMonitor, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Health endpoint on http://{}/health", addr);
    }
    axum::serve(listener, router(monitor))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
