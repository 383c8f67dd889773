//! Text rendering of OTLP export requests
//!
//! [`TextMarshaler`] produces the indented, human-readable layout operators
//! know from the collector's debug exporter:
//!
//! ```text
//! ResourceSpans #0
//! Resource SchemaURL:
//! Resource attributes:
//!      -> service.name: Str(checkout)
//! ScopeSpans #0
//! ScopeSchemaURL:
//! InstrumentationScope io.demo 1.0.0
//! Span #0
//!     Trace ID       : 0102030405060708090a0b0c0d0e0f10
//!     Name           : GET /cart
//!     Kind           : SPAN_KIND_SERVER
//! ```

use crate::error::Result;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope, KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{
    ExponentialHistogramDataPoint, HistogramDataPoint, NumberDataPoint, SummaryDataPoint, metric,
    number_data_point,
};
use opentelemetry_proto::tonic::resource::v1::Resource;
use opentelemetry_proto::tonic::trace::v1::span::SpanKind;
use std::fmt::{self, Write};

/// Serializes a telemetry payload to bytes
pub trait Marshaler<T>: Send + Sync {
    fn marshal(&self, payload: &T) -> Result<Vec<u8>>;
}

/// Debug-exporter style text marshaler for traces, metrics and logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMarshaler;

impl TextMarshaler {
    pub fn new() -> Self {
        Self
    }
}

impl Marshaler<ExportTraceServiceRequest> for TextMarshaler {
    fn marshal(&self, request: &ExportTraceServiceRequest) -> Result<Vec<u8>> {
        let mut out = String::new();
        for (i, rs) in request.resource_spans.iter().enumerate() {
            writeln!(out, "ResourceSpans #{i}")?;
            write_resource(&mut out, rs.resource.as_ref(), &rs.schema_url)?;
            for (j, ss) in rs.scope_spans.iter().enumerate() {
                writeln!(out, "ScopeSpans #{j}")?;
                write_scope(&mut out, ss.scope.as_ref(), &ss.schema_url)?;
                for (k, span) in ss.spans.iter().enumerate() {
                    writeln!(out, "Span #{k}")?;
                    writeln!(out, "    Trace ID       : {}", hex::encode(&span.trace_id))?;
                    writeln!(out, "    Parent ID      : {}", hex::encode(&span.parent_span_id))?;
                    writeln!(out, "    ID             : {}", hex::encode(&span.span_id))?;
                    writeln!(out, "    Name           : {}", span.name)?;
                    writeln!(out, "    Kind           : {}", span_kind(span.kind))?;
                    writeln!(out, "    Start time     : {}", span.start_time_unix_nano)?;
                    writeln!(out, "    End time       : {}", span.end_time_unix_nano)?;
                    if let Some(status) = &span.status {
                        writeln!(out, "    Status code    : {}", status.code)?;
                        writeln!(out, "    Status message : {}", status.message)?;
                    }
                    write_attributes(&mut out, "Attributes", &span.attributes)?;
                    for (e, event) in span.events.iter().enumerate() {
                        writeln!(out, "SpanEvent #{e}")?;
                        writeln!(out, "     -> Name: {}", event.name)?;
                        writeln!(out, "     -> Timestamp: {}", event.time_unix_nano)?;
                    }
                    for (l, link) in span.links.iter().enumerate() {
                        writeln!(out, "SpanLink #{l}")?;
                        writeln!(out, "     -> Trace ID: {}", hex::encode(&link.trace_id))?;
                        writeln!(out, "     -> ID: {}", hex::encode(&link.span_id))?;
                    }
                }
            }
        }
        Ok(out.into_bytes())
    }
}

impl Marshaler<ExportMetricsServiceRequest> for TextMarshaler {
    fn marshal(&self, request: &ExportMetricsServiceRequest) -> Result<Vec<u8>> {
        let mut out = String::new();
        for (i, rm) in request.resource_metrics.iter().enumerate() {
            writeln!(out, "ResourceMetrics #{i}")?;
            write_resource(&mut out, rm.resource.as_ref(), &rm.schema_url)?;
            for (j, sm) in rm.scope_metrics.iter().enumerate() {
                writeln!(out, "ScopeMetrics #{j}")?;
                write_scope(&mut out, sm.scope.as_ref(), &sm.schema_url)?;
                for (k, m) in sm.metrics.iter().enumerate() {
                    writeln!(out, "Metric #{k}")?;
                    writeln!(out, "Descriptor:")?;
                    writeln!(out, "     -> Name: {}", m.name)?;
                    writeln!(out, "     -> Description: {}", m.description)?;
                    writeln!(out, "     -> Unit: {}", m.unit)?;
                    write_metric_data(&mut out, m.data.as_ref())?;
                }
            }
        }
        Ok(out.into_bytes())
    }
}

impl Marshaler<ExportLogsServiceRequest> for TextMarshaler {
    fn marshal(&self, request: &ExportLogsServiceRequest) -> Result<Vec<u8>> {
        let mut out = String::new();
        for (i, rl) in request.resource_logs.iter().enumerate() {
            writeln!(out, "ResourceLog #{i}")?;
            write_resource(&mut out, rl.resource.as_ref(), &rl.schema_url)?;
            for (j, sl) in rl.scope_logs.iter().enumerate() {
                writeln!(out, "ScopeLogs #{j}")?;
                write_scope(&mut out, sl.scope.as_ref(), &sl.schema_url)?;
                for (k, log) in sl.log_records.iter().enumerate() {
                    writeln!(out, "LogRecord #{k}")?;
                    writeln!(out, "ObservedTimestamp: {}", log.observed_time_unix_nano)?;
                    writeln!(out, "Timestamp: {}", log.time_unix_nano)?;
                    writeln!(out, "SeverityText: {}", log.severity_text)?;
                    writeln!(out, "SeverityNumber: {}", log.severity_number)?;
                    writeln!(out, "Body: {}", any_value(log.body.as_ref()))?;
                    write_attributes(&mut out, "Attributes", &log.attributes)?;
                    writeln!(out, "Trace ID: {}", hex::encode(&log.trace_id))?;
                    writeln!(out, "Span ID: {}", hex::encode(&log.span_id))?;
                    writeln!(out, "Flags: {}", log.flags)?;
                }
            }
        }
        Ok(out.into_bytes())
    }
}

fn write_resource(out: &mut String, resource: Option<&Resource>, schema_url: &str) -> fmt::Result {
    writeln!(out, "Resource SchemaURL: {schema_url}")?;
    let attributes = resource.map(|r| r.attributes.as_slice()).unwrap_or_default();
    write_attributes(out, "Resource attributes", attributes)
}

fn write_scope(out: &mut String, scope: Option<&InstrumentationScope>, schema_url: &str) -> fmt::Result {
    writeln!(out, "ScopeSchemaURL: {schema_url}")?;
    match scope {
        Some(scope) => {
            writeln!(out, "InstrumentationScope {} {}", scope.name, scope.version)?;
            if !scope.attributes.is_empty() {
                write_attributes(out, "InstrumentationScope attributes", &scope.attributes)?;
            }
            Ok(())
        }
        None => writeln!(out, "InstrumentationScope"),
    }
}

fn write_attributes(out: &mut String, header: &str, attributes: &[KeyValue]) -> fmt::Result {
    if attributes.is_empty() {
        return Ok(());
    }
    writeln!(out, "{header}:")?;
    for kv in attributes {
        writeln!(out, "     -> {}: {}", kv.key, any_value(kv.value.as_ref()))?;
    }
    Ok(())
}

fn write_metric_data(out: &mut String, data: Option<&metric::Data>) -> fmt::Result {
    match data {
        Some(metric::Data::Gauge(gauge)) => {
            writeln!(out, "     -> DataType: Gauge")?;
            write_number_points(out, &gauge.data_points)
        }
        Some(metric::Data::Sum(sum)) => {
            writeln!(out, "     -> DataType: Sum")?;
            writeln!(out, "     -> IsMonotonic: {}", sum.is_monotonic)?;
            writeln!(out, "     -> AggregationTemporality: {}", sum.aggregation_temporality)?;
            write_number_points(out, &sum.data_points)
        }
        Some(metric::Data::Histogram(histogram)) => {
            writeln!(out, "     -> DataType: Histogram")?;
            writeln!(
                out,
                "     -> AggregationTemporality: {}",
                histogram.aggregation_temporality
            )?;
            write_histogram_points(out, &histogram.data_points)
        }
        Some(metric::Data::ExponentialHistogram(histogram)) => {
            writeln!(out, "     -> DataType: ExponentialHistogram")?;
            writeln!(
                out,
                "     -> AggregationTemporality: {}",
                histogram.aggregation_temporality
            )?;
            write_exponential_points(out, &histogram.data_points)
        }
        Some(metric::Data::Summary(summary)) => {
            writeln!(out, "     -> DataType: Summary")?;
            write_summary_points(out, &summary.data_points)
        }
        None => writeln!(out, "     -> DataType: Empty"),
    }
}

fn write_point_header(
    out: &mut String,
    index: usize,
    kind: &str,
    attributes: &[KeyValue],
    start: u64,
    time: u64,
) -> fmt::Result {
    writeln!(out, "{kind} #{index}")?;
    write_attributes(out, "Data point attributes", attributes)?;
    writeln!(out, "StartTimestamp: {start}")?;
    writeln!(out, "Timestamp: {time}")
}

fn write_number_points(out: &mut String, points: &[NumberDataPoint]) -> fmt::Result {
    for (i, p) in points.iter().enumerate() {
        write_point_header(
            out,
            i,
            "NumberDataPoints",
            &p.attributes,
            p.start_time_unix_nano,
            p.time_unix_nano,
        )?;
        match p.value {
            Some(number_data_point::Value::AsDouble(v)) => writeln!(out, "Value: {v:.6}")?,
            Some(number_data_point::Value::AsInt(v)) => writeln!(out, "Value: {v}")?,
            None => writeln!(out, "Value: <empty>")?,
        }
    }
    Ok(())
}

fn write_histogram_points(out: &mut String, points: &[HistogramDataPoint]) -> fmt::Result {
    for (i, p) in points.iter().enumerate() {
        write_point_header(
            out,
            i,
            "HistogramDataPoints",
            &p.attributes,
            p.start_time_unix_nano,
            p.time_unix_nano,
        )?;
        writeln!(out, "Count: {}", p.count)?;
        if let Some(sum) = p.sum {
            writeln!(out, "Sum: {sum:.6}")?;
        }
        for (b, bound) in p.explicit_bounds.iter().enumerate() {
            writeln!(out, "ExplicitBounds #{b}: {bound:.6}")?;
        }
        for (b, count) in p.bucket_counts.iter().enumerate() {
            writeln!(out, "Buckets #{b}, Count: {count}")?;
        }
    }
    Ok(())
}

fn write_exponential_points(
    out: &mut String,
    points: &[ExponentialHistogramDataPoint],
) -> fmt::Result {
    for (i, p) in points.iter().enumerate() {
        write_point_header(
            out,
            i,
            "ExponentialHistogramDataPoints",
            &p.attributes,
            p.start_time_unix_nano,
            p.time_unix_nano,
        )?;
        writeln!(out, "Count: {}", p.count)?;
        if let Some(sum) = p.sum {
            writeln!(out, "Sum: {sum:.6}")?;
        }
        writeln!(out, "Scale: {}", p.scale)?;
        writeln!(out, "ZeroCount: {}", p.zero_count)?;
    }
    Ok(())
}

fn write_summary_points(out: &mut String, points: &[SummaryDataPoint]) -> fmt::Result {
    for (i, p) in points.iter().enumerate() {
        write_point_header(
            out,
            i,
            "SummaryDataPoints",
            &p.attributes,
            p.start_time_unix_nano,
            p.time_unix_nano,
        )?;
        writeln!(out, "Count: {}", p.count)?;
        writeln!(out, "Sum: {:.6}", p.sum)?;
        for q in &p.quantile_values {
            writeln!(out, "QuantileValue: {:.2} -> {:.6}", q.quantile, q.value)?;
        }
    }
    Ok(())
}

/// `Type(value)` rendering of an attribute or body value
fn any_value(value: Option<&AnyValue>) -> String {
    match value.and_then(|v| v.value.as_ref()) {
        Some(any_value::Value::StringValue(s)) => format!("Str({s})"),
        Some(any_value::Value::BoolValue(b)) => format!("Bool({b})"),
        Some(any_value::Value::IntValue(i)) => format!("Int({i})"),
        Some(any_value::Value::DoubleValue(d)) => format!("Double({d})"),
        Some(any_value::Value::BytesValue(bytes)) => format!("Bytes({})", hex::encode(bytes)),
        Some(any_value::Value::ArrayValue(array)) => {
            let items: Vec<String> = array.values.iter().map(|v| any_value(Some(v))).collect();
            format!("Slice([{}])", items.join(", "))
        }
        Some(any_value::Value::KvlistValue(list)) => {
            let items: Vec<String> = list
                .values
                .iter()
                .map(|kv| format!("{}: {}", kv.key, any_value(kv.value.as_ref())))
                .collect();
            format!("Map({{{}}})", items.join(", "))
        }
        None => "Empty()".to_string(),
    }
}

fn span_kind(kind: i32) -> &'static str {
    SpanKind::try_from(kind)
        .map(|k| k.as_str_name())
        .unwrap_or("SPAN_KIND_UNKNOWN")
}
