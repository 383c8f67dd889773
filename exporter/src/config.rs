//! Configuration for the exporter
//!
//! Every setting comes from a `FLUENTD_EXPORTER_*` environment variable and
//! falls back to a default when unset.

use crate::error::{ExporterError, Result};
use crate::transmit::FluentConfig;
use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

/// Prefix shared by all environment variables
pub const ENV_PREFIX: &str = "FLUENTD_EXPORTER_";

/// Main configuration for the exporter
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// OTLP gRPC listen address
    pub grpc_addr: SocketAddr,

    /// Metrics server address
    pub metrics_addr: SocketAddr,

    /// Fluentd tag for every record
    pub tag: String,

    /// Append `.trace`, `.metric` or `.log` to the tag per signal
    pub per_signal_tags: bool,

    /// Fluentd connection settings
    pub fluent: FluentConfig,

    /// Forwarder queue capacity, per signal
    pub queue_size: usize,

    /// Log level
    pub log_level: String,

    /// Log format (json or pretty)
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("{other} (expected 'json' or 'pretty')")),
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            grpc_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 4317)),
            metrics_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
            tag: "app".to_string(),
            per_signal_tags: false,
            fluent: FluentConfig::default(),
            queue_size: 1024,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Parse `value` for variable `name`, naming it in the error
fn parse<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ExporterError::Config(format!("invalid {ENV_PREFIX}{name}: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ExporterError::Config(format!(
            "invalid {ENV_PREFIX}{name}: {other} (expected true or false)"
        ))),
    }
}

fn parse_millis(name: &str, value: &str) -> Result<Duration> {
    parse::<u64>(name, value).map(Duration::from_millis)
}

impl ExporterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// `lookup` receives the full variable name, prefix included.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = ExporterConfig::default();

        if let Some(v) = var("GRPC_ADDR") {
            config.grpc_addr = parse("GRPC_ADDR", &v)?;
        }
        if let Some(v) = var("METRICS_ADDR") {
            config.metrics_addr = parse("METRICS_ADDR", &v)?;
        }
        if let Some(v) = var("TAG") {
            config.tag = v;
        }
        if let Some(v) = var("PER_SIGNAL_TAGS") {
            config.per_signal_tags = parse_bool("PER_SIGNAL_TAGS", &v)?;
        }

        let fluent = &mut config.fluent;
        if let Some(v) = var("HOST") {
            fluent.host = v;
        }
        if let Some(v) = var("PORT") {
            fluent.port = parse("PORT", &v)?;
        }
        if let Some(v) = var("TIMEOUT_MS") {
            fluent.timeout = parse_millis("TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("WRITE_TIMEOUT_MS") {
            fluent.write_timeout = parse_millis("WRITE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("BUFFER_LIMIT") {
            fluent.buffer_limit = parse("BUFFER_LIMIT", &v)?;
        }
        if let Some(v) = var("RETRY_WAIT_MS") {
            fluent.retry_wait = parse_millis("RETRY_WAIT_MS", &v)?;
        }
        if let Some(v) = var("MAX_RETRY") {
            fluent.max_retry = parse("MAX_RETRY", &v)?;
        }
        if let Some(v) = var("MAX_RETRY_WAIT_MS") {
            fluent.max_retry_wait = parse_millis("MAX_RETRY_WAIT_MS", &v)?;
        }
        if let Some(v) = var("TAG_PREFIX") {
            fluent.tag_prefix = v;
        }
        if let Some(v) = var("ASYNC") {
            fluent.async_connect = parse_bool("ASYNC", &v)?;
        }

        if let Some(v) = var("QUEUE_SIZE") {
            config.queue_size = parse("QUEUE_SIZE", &v)?;
        }
        if let Some(v) = var("LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = var("LOG_FORMAT") {
            config.log_format = parse("LOG_FORMAT", &v)?;
        }

        Ok(config)
    }

    /// Reject settings no exporter can run with
    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() {
            return Err(ExporterError::Config("tag must not be empty".to_string()));
        }
        if self.fluent.host.trim().is_empty() {
            return Err(ExporterError::Config("fluent host must not be empty".to_string()));
        }
        if self.fluent.port == 0 {
            return Err(ExporterError::Config("fluent port must not be 0".to_string()));
        }
        if self.queue_size == 0 {
            return Err(ExporterError::Config("queue size must not be 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ExporterConfig::default();
        assert_eq!(config.grpc_addr.port(), 4317);
        assert_eq!(config.metrics_addr.port(), 9090);
        assert_eq!(config.tag, "app");
        assert_eq!(config.fluent.host, "localhost");
        assert_eq!(config.fluent.port, 24224);
        assert_eq!(config.queue_size, 1024);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ExporterConfig::from_lookup(lookup(&[
            ("TAG", "otel"),
            ("PER_SIGNAL_TAGS", "true"),
            ("HOST", "fluentd.svc"),
            ("PORT", "24225"),
            ("TIMEOUT_MS", "250"),
            ("WRITE_TIMEOUT_MS", "1000"),
            ("MAX_RETRY", "2"),
            ("TAG_PREFIX", "k8s"),
            ("ASYNC", "yes"),
            ("QUEUE_SIZE", "16"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.tag, "otel");
        assert!(config.per_signal_tags);
        assert_eq!(config.fluent.host, "fluentd.svc");
        assert_eq!(config.fluent.port, 24225);
        assert_eq!(config.fluent.timeout, Duration::from_millis(250));
        assert_eq!(config.fluent.write_timeout, Duration::from_secs(1));
        assert_eq!(config.fluent.max_retry, 2);
        assert_eq!(config.fluent.tag_prefix, "k8s");
        assert!(config.fluent.async_connect);
        assert_eq!(config.queue_size, 16);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_parse_error_names_variable() {
        let err = ExporterConfig::from_lookup(lookup(&[("PORT", "not-a-port")])).unwrap_err();
        assert!(err.to_string().contains("FLUENTD_EXPORTER_PORT"));

        let err = ExporterConfig::from_lookup(lookup(&[("ASYNC", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("FLUENTD_EXPORTER_ASYNC"));

        let err = ExporterConfig::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).unwrap_err();
        assert!(err.to_string().contains("FLUENTD_EXPORTER_LOG_FORMAT"));
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = ExporterConfig::default();
        config.tag = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = ExporterConfig::default();
        config.fluent.port = 0;
        assert!(config.validate().is_err());

        let mut config = ExporterConfig::default();
        config.queue_size = 0;
        assert!(config.validate().is_err());
    }
}
