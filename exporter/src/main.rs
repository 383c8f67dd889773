//! fluentd-exporter - OTLP receiver forwarding to Fluentd
//!
//! ## Usage
//!
//! ```bash
//! # Forward to a local Fluentd on 24224
//! cargo run
//!
//! # Per-signal tags, JSON logs
//! FLUENTD_EXPORTER_PER_SIGNAL_TAGS=true FLUENTD_EXPORTER_LOG_FORMAT=json cargo run
//! ```
//!
//! ## Environment Variables
//!
//! - `FLUENTD_EXPORTER_GRPC_ADDR`: OTLP gRPC address (default: "0.0.0.0:4317")
//! - `FLUENTD_EXPORTER_METRICS_ADDR`: Metrics server address (default: "0.0.0.0:9090")
//! - `FLUENTD_EXPORTER_TAG`: Fluentd tag (default: "app")
//! - `FLUENTD_EXPORTER_HOST` / `FLUENTD_EXPORTER_PORT`: Fluentd daemon (default: localhost:24224)
//! - `FLUENTD_EXPORTER_QUEUE_SIZE`: Forwarder queue per signal (default: 1024)
//! - `FLUENTD_EXPORTER_LOG_LEVEL`: Log level (default: "info")
//!
//! See [`ExporterConfig`] for the full list.

use fluentd_exporter::config::{ExporterConfig, LogFormat};
use fluentd_exporter::error::ExporterError;
use fluentd_exporter::exporter::create_exporters;
use fluentd_exporter::metrics::Metrics;
use fluentd_exporter::metrics_server::MetricsServer;
use fluentd_exporter::server::OtlpReceiver;
use fluentd_exporter::transmit::FluentClient;
use tokio::signal;
use tonic::transport::Server;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ExporterConfig::from_env()?;
    init_tracing(&config);
    config.validate()?;

    info!(
        grpc_addr = %config.grpc_addr,
        metrics_addr = %config.metrics_addr,
        fluent = %config.fluent.address(),
        tag = %config.tag,
        "Starting fluentd-exporter"
    );

    Metrics::init()?;
    let metrics_handle = MetricsServer::start(config.metrics_addr);

    let exporters = create_exporters(&config)
        .await
        .map_err(|e| ExporterError::plugin(FluentClient::NAME, e))?;
    let receiver = OtlpReceiver::from_exporters(&exporters);

    let addr = config.grpc_addr;
    info!(%addr, "OTLP gRPC server listening");

    Server::builder()
        .add_service(receiver.trace_server())
        .add_service(receiver.metrics_server())
        .add_service(receiver.logs_server())
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .map_err(ExporterError::Transport)?;

    // In-flight exports are done, drain every forwarder
    exporters.shutdown().await;
    metrics_handle.abort();
    info!(
        requests = receiver.requests_handled(),
        "fluentd-exporter shutdown complete"
    );
    Ok(())
}

fn init_tracing(config: &ExporterConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = ?e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
