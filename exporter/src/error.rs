//! Error types for the Fluentd exporter

use thiserror::Error;

/// Result type alias for exporter operations
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Main error type for the exporter
#[derive(Error, Debug)]
#[allow(clippy::result_large_err)]
pub enum ExporterError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// gRPC transport error
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Output or transmit plugin error
    #[error("plugin '{plugin}' error: {message}")]
    Plugin { plugin: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Telemetry payload could not be rendered
    #[error("marshal error: {0}")]
    Marshal(String),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),
}

/// Error type for output and transmit plugins
#[derive(Error, Debug)]
pub enum PluginError {
    /// Send failed
    #[error("send failed: {0}")]
    Send(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// Record could not be encoded for the wire
    #[error("encode failed: {0}")]
    Encode(String),

    /// Not ready
    #[error("plugin not ready")]
    NotReady,

    /// Shutdown error
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

impl ExporterError {
    /// Wrap a plugin error with the name of the plugin that raised it
    pub fn plugin(plugin: &str, err: PluginError) -> Self {
        ExporterError::Plugin {
            plugin: plugin.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<std::fmt::Error> for ExporterError {
    fn from(_: std::fmt::Error) -> Self {
        ExporterError::Marshal("failed to render text".to_string())
    }
}

impl From<rmp_serde::encode::Error> for PluginError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        PluginError::Encode(err.to_string())
    }
}

impl From<ExporterError> for tonic::Status {
    fn from(err: ExporterError) -> Self {
        match err {
            ExporterError::Config(msg) => tonic::Status::invalid_argument(msg),
            ExporterError::Transport(e) => tonic::Status::unavailable(e.to_string()),
            ExporterError::Plugin { plugin, message } => {
                tonic::Status::internal(format!("plugin '{plugin}': {message}"))
            }
            ExporterError::Io(e) => tonic::Status::internal(e.to_string()),
            ExporterError::Marshal(msg) => tonic::Status::internal(format!("marshal: {msg}")),
            ExporterError::Metrics(msg) => tonic::Status::internal(format!("metrics: {msg}")),
        }
    }
}
