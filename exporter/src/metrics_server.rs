//! HTTP server for the Prometheus scrape endpoint
//!
//! Serves `/metrics` and `/health` on its own address, apart from the OTLP
//! gRPC listener.
//!
//! ```ignore
//! let handle = MetricsServer::start("0.0.0.0:9090".parse()?);
//! // ...
//! handle.abort();
//! ```

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Metrics HTTP server
pub struct MetricsServer;

impl MetricsServer {
    /// Spawn the server on `addr`
    ///
    /// A bind failure is logged and ends the task; exporting keeps working.
    pub fn start(addr: SocketAddr) -> JoinHandle<()> {
        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    error!(error = %e, %addr, "Failed to bind metrics server");
                    return;
                }
            };
            info!(%addr, "Metrics server listening");

            if let Err(e) = axum::serve(listener, router()).await {
                error!(error = %e, "Metrics server error");
            }
        })
    }
}

fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
}

async fn metrics_handler() -> impl IntoResponse {
    let body = crate::metrics::gather();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
