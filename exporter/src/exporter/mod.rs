//! OTLP to Fluentd adapter
//!
//! [`FluentdExporter`] turns one export request into one summary record:
//! counts of the request's contents plus a text rendering of the whole
//! payload. The record is handed to an [`Output`] with the current time.
//!
//! ```text
//! ExportTraceServiceRequest ──► { "resource spans": 1,
//!                                 "spans": 12,
//!                                 "traces": "ResourceSpans #0\n..." }
//!                           ──► output.post(now, "traces", record)
//! ```

pub mod factory;
pub mod marshal;

use crate::clock::{Clock, SystemClock};
use crate::error::{ExporterError, Result};
use crate::output::Output;
use crate::record::Record;
use marshal::{Marshaler, TextMarshaler};
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::metrics::v1::metric;
use std::sync::Arc;
use tracing::debug;

pub use factory::{Exporters, Signal, create_exporter, create_exporters, signal_tag};

/// Record field holding the rendered payload, for every signal
pub const TEXT_FIELD: &str = "traces";

/// Event type of trace summaries
pub const TRACES: &str = "traces";
/// Event type of metric summaries
pub const METRICS: &str = "metrics";
/// Event type of log summaries
pub const LOGS: &str = "logs";

/// Forwards OTLP export requests to one output as summary records
pub struct FluentdExporter {
    output: Arc<dyn Output>,
    clock: Arc<dyn Clock>,
    traces_marshaler: Arc<dyn Marshaler<ExportTraceServiceRequest>>,
    metrics_marshaler: Arc<dyn Marshaler<ExportMetricsServiceRequest>>,
    logs_marshaler: Arc<dyn Marshaler<ExportLogsServiceRequest>>,
}

impl FluentdExporter {
    /// Exporter with text marshalers and the system clock
    pub fn new(output: Arc<dyn Output>) -> Self {
        Self {
            output,
            clock: Arc::new(SystemClock),
            traces_marshaler: Arc::new(TextMarshaler),
            metrics_marshaler: Arc::new(TextMarshaler),
            logs_marshaler: Arc::new(TextMarshaler),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_traces_marshaler(
        mut self,
        marshaler: Arc<dyn Marshaler<ExportTraceServiceRequest>>,
    ) -> Self {
        self.traces_marshaler = marshaler;
        self
    }

    pub fn with_metrics_marshaler(
        mut self,
        marshaler: Arc<dyn Marshaler<ExportMetricsServiceRequest>>,
    ) -> Self {
        self.metrics_marshaler = marshaler;
        self
    }

    pub fn with_logs_marshaler(
        mut self,
        marshaler: Arc<dyn Marshaler<ExportLogsServiceRequest>>,
    ) -> Self {
        self.logs_marshaler = marshaler;
        self
    }

    /// Name of the output records are posted to
    pub fn output_name(&self) -> &'static str {
        self.output.name()
    }

    /// Post a summary of a trace export request
    ///
    /// # Errors
    /// Returns `ExporterError::Marshal` if the payload cannot be rendered;
    /// nothing is posted in that case
    pub async fn push_traces(&self, request: &ExportTraceServiceRequest) -> Result<()> {
        let text = marshal_text(self.traces_marshaler.as_ref(), request)?;
        let record = Record::new()
            .with_field("resource spans", request.resource_spans.len())
            .with_field("spans", span_count(request))
            .with_field(TEXT_FIELD, text);
        self.post(TRACES, record).await;
        Ok(())
    }

    /// Post a summary of a metrics export request
    ///
    /// # Errors
    /// Returns `ExporterError::Marshal` if the payload cannot be rendered
    pub async fn push_metrics(&self, request: &ExportMetricsServiceRequest) -> Result<()> {
        let text = marshal_text(self.metrics_marshaler.as_ref(), request)?;
        let record = Record::new()
            .with_field("resource metrics", request.resource_metrics.len())
            .with_field("metrics", metric_count(request))
            .with_field("data points", data_point_count(request))
            .with_field(TEXT_FIELD, text);
        self.post(METRICS, record).await;
        Ok(())
    }

    /// Post a summary of a logs export request
    ///
    /// # Errors
    /// Returns `ExporterError::Marshal` if the payload cannot be rendered
    pub async fn push_logs(&self, request: &ExportLogsServiceRequest) -> Result<()> {
        let text = marshal_text(self.logs_marshaler.as_ref(), request)?;
        let record = Record::new()
            .with_field("resource logs", request.resource_logs.len())
            .with_field("log records", log_record_count(request))
            .with_field(TEXT_FIELD, text);
        self.post(LOGS, record).await;
        Ok(())
    }

    async fn post(&self, event_type: &str, record: Record) {
        debug!(output = self.output.name(), event_type, fields = record.len(), "Posting summary");
        self.output.post(self.clock.now(), event_type, record).await;
    }

    /// Close the output, draining what it still holds
    pub async fn shutdown(&self) {
        self.output.close().await;
    }
}

fn marshal_text<T>(marshaler: &dyn Marshaler<T>, payload: &T) -> Result<String> {
    let bytes = marshaler.marshal(payload)?;
    String::from_utf8(bytes).map_err(|e| ExporterError::Marshal(format!("not UTF-8: {e}")))
}

/// Spans across all resources and scopes
pub fn span_count(request: &ExportTraceServiceRequest) -> usize {
    request
        .resource_spans
        .iter()
        .flat_map(|rs| &rs.scope_spans)
        .map(|ss| ss.spans.len())
        .sum()
}

/// Metrics across all resources and scopes
pub fn metric_count(request: &ExportMetricsServiceRequest) -> usize {
    request
        .resource_metrics
        .iter()
        .flat_map(|rm| &rm.scope_metrics)
        .map(|sm| sm.metrics.len())
        .sum()
}

/// Data points across all metrics, whatever their kind
pub fn data_point_count(request: &ExportMetricsServiceRequest) -> usize {
    request
        .resource_metrics
        .iter()
        .flat_map(|rm| &rm.scope_metrics)
        .flat_map(|sm| &sm.metrics)
        .map(|m| match &m.data {
            Some(metric::Data::Gauge(d)) => d.data_points.len(),
            Some(metric::Data::Sum(d)) => d.data_points.len(),
            Some(metric::Data::Histogram(d)) => d.data_points.len(),
            Some(metric::Data::ExponentialHistogram(d)) => d.data_points.len(),
            Some(metric::Data::Summary(d)) => d.data_points.len(),
            None => 0,
        })
        .sum()
}

/// Log records across all resources and scopes
pub fn log_record_count(request: &ExportLogsServiceRequest) -> usize {
    request
        .resource_logs
        .iter()
        .flat_map(|rl| &rl.scope_logs)
        .map(|sl| sl.log_records.len())
        .sum()
}
