//! HTTP status server for watching a running batch.
//!
//! Provides two endpoints:
//! - `/metrics` - Prometheus-compatible metrics, including per-credential series
//! - `/status` - JSON with batch progress, event counters, and the governor snapshot
//!
//! Credentials appear only under their redacted labels. The server runs in the
//! background and does not block relaying.

mod handlers;
mod types;

use axum::routing::get;
use axum::Router;

use handlers::{metrics_handler, status_handler};
pub use types::{StatusResponse, StatusState};

/// Routes served by the status server.
pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

/// Binds to `127.0.0.1:port` and serves until the task is dropped.
pub async fn start_status_server(port: u16, state: StatusState) -> Result<(), anyhow::Error> {
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind status server to port {}: {}", port, e))?;

    log::info!("Status server listening on http://127.0.0.1:{}/", port);
    log::info!("  - Metrics: http://127.0.0.1:{}/metrics", port);
    log::info!("  - Status: http://127.0.0.1:{}/status", port);

    axum::serve(listener, router(state))
        .await
        .map_err(|e| anyhow::anyhow!("Status server error: {}", e))?;

    Ok(())
}
