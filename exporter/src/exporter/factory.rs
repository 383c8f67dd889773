//! Builds one exporter per telemetry signal from configuration

use crate::config::ExporterConfig;
use crate::error::PluginError;
use crate::exporter::FluentdExporter;
use crate::output::NetworkForwarder;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Telemetry signal handled by an exporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Traces,
    Metrics,
    Logs,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Traces, Signal::Metrics, Signal::Logs];

    /// Tag suffix used when per-signal tags are enabled
    pub fn tag_suffix(self) -> &'static str {
        match self {
            Signal::Traces => "trace",
            Signal::Metrics => "metric",
            Signal::Logs => "log",
        }
    }

    /// Event type stamped on the signal's records
    pub fn event_type(self) -> &'static str {
        match self {
            Signal::Traces => super::TRACES,
            Signal::Metrics => super::METRICS,
            Signal::Logs => super::LOGS,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_type())
    }
}

/// Tag for `signal`: `base`, or `base.<suffix>` with per-signal tags
pub fn signal_tag(base: &str, signal: Signal, per_signal: bool) -> String {
    if per_signal {
        format!("{base}.{}", signal.tag_suffix())
    } else {
        base.to_string()
    }
}

/// Create the exporter for one signal, with its own Fluentd connection
///
/// # Errors
/// Returns `PluginError::Connection` if the daemon cannot be reached and
/// async connect is off
pub async fn create_exporter(
    config: &ExporterConfig,
    signal: Signal,
) -> Result<FluentdExporter, PluginError> {
    let tag = signal_tag(&config.tag, signal, config.per_signal_tags);
    let forwarder = NetworkForwarder::connect(&config.fluent, tag.clone(), config.queue_size).await?;
    info!(
        %signal,
        %tag,
        address = %config.fluent.address(),
        queue_size = config.queue_size,
        "Exporter created"
    );
    Ok(FluentdExporter::new(Arc::new(forwarder)))
}

/// Exporters for all three signals
pub struct Exporters {
    pub traces: Arc<FluentdExporter>,
    pub metrics: Arc<FluentdExporter>,
    pub logs: Arc<FluentdExporter>,
}

impl Exporters {
    /// Close every exporter, draining their queues
    pub async fn shutdown(&self) {
        self.traces.shutdown().await;
        self.metrics.shutdown().await;
        self.logs.shutdown().await;
        info!("Exporters shut down");
    }
}

/// Create exporters for traces, metrics and logs
///
/// # Errors
/// Fails on the first exporter that cannot connect
pub async fn create_exporters(config: &ExporterConfig) -> Result<Exporters, PluginError> {
    Ok(Exporters {
        traces: Arc::new(create_exporter(config, Signal::Traces).await?),
        metrics: Arc::new(create_exporter(config, Signal::Metrics).await?),
        logs: Arc::new(create_exporter(config, Signal::Logs).await?),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transmit::FluentConfig;
    use std::time::Duration;

    #[test]
    fn test_signal_tag() {
        assert_eq!(signal_tag("app", Signal::Traces, false), "app");
        assert_eq!(signal_tag("app", Signal::Traces, true), "app.trace");
        assert_eq!(signal_tag("app", Signal::Metrics, true), "app.metric");
        assert_eq!(signal_tag("app", Signal::Logs, true), "app.log");
    }

    #[test]
    fn test_signal_event_type() {
        let types: Vec<&str> = Signal::ALL.iter().map(|s| s.event_type()).collect();
        assert_eq!(types, ["traces", "metrics", "logs"]);
        assert_eq!(Signal::Logs.to_string(), "logs");
    }

    #[tokio::test]
    async fn test_create_exporter_unreachable() {
        let config = ExporterConfig {
            fluent: FluentConfig {
                host: "127.0.0.1".to_string(),
                port: 1,
                timeout: Duration::from_millis(200),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = create_exporter(&config, Signal::Traces).await;
        assert!(matches!(result, Err(PluginError::Connection(_))));
    }

    #[tokio::test]
    async fn test_create_exporters_async_connect() {
        let config = ExporterConfig {
            fluent: FluentConfig {
                host: "127.0.0.1".to_string(),
                port: 1,
                async_connect: true,
                max_retry: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let exporters = create_exporters(&config).await.unwrap();
        assert_eq!(exporters.traces.output_name(), "forwarder");
        exporters.shutdown().await;
    }
}
