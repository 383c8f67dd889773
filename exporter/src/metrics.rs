//! Prometheus metrics for the exporter

use crate::error::{ExporterError, Result};
use parking_lot::Mutex;
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramVec, IntCounter, TextEncoder, register_counter_vec,
    register_gauge_vec, register_histogram_vec, register_int_counter,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Serializes registration so concurrent `init` calls never register twice
static INIT: Mutex<()> = parking_lot::const_mutex(());

/// All exporter metrics
pub struct Metrics {
    /// Records accepted by an output (by output, type)
    pub records_posted: CounterVec,

    /// Records delivered to Fluentd (by tag)
    pub records_forwarded: CounterVec,

    /// Records dropped (by reason)
    pub records_dropped: CounterVec,

    /// Records waiting in the forwarder queue (by tag)
    pub queue_depth: GaugeVec,

    /// Time to transmit one record (by tag)
    pub transmit_latency: HistogramVec,

    /// Log files opened by the rotating writer
    pub file_rotations: IntCounter,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    ///
    /// Returns error if metric registration fails.
    #[allow(clippy::result_large_err)]
    pub fn init() -> Result<&'static Metrics> {
        let _guard = INIT.lock();
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            records_posted: register_counter_vec!(
                "fluentd_exporter_records_posted_total",
                "Total records posted to outputs",
                &["output", "type"]
            )
            .map_err(|e| ExporterError::Metrics(format!("records_posted: {e}")))?,

            records_forwarded: register_counter_vec!(
                "fluentd_exporter_records_forwarded_total",
                "Total records delivered to Fluentd",
                &["tag"]
            )
            .map_err(|e| ExporterError::Metrics(format!("records_forwarded: {e}")))?,

            records_dropped: register_counter_vec!(
                "fluentd_exporter_records_dropped_total",
                "Total records dropped",
                &["reason"]
            )
            .map_err(|e| ExporterError::Metrics(format!("records_dropped: {e}")))?,

            queue_depth: register_gauge_vec!(
                "fluentd_exporter_queue_depth",
                "Records waiting in the forwarder queue",
                &["tag"]
            )
            .map_err(|e| ExporterError::Metrics(format!("queue_depth: {e}")))?,

            transmit_latency: register_histogram_vec!(
                "fluentd_exporter_transmit_latency_seconds",
                "Time to transmit one record",
                &["tag"],
                vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
            )
            .map_err(|e| ExporterError::Metrics(format!("transmit_latency: {e}")))?,

            file_rotations: register_int_counter!(
                "fluentd_exporter_file_rotations_total",
                "Log files opened by the rotating writer"
            )
            .map_err(|e| ExporterError::Metrics(format!("file_rotations: {e}")))?,
        };

        // Only the first set wins
        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| ExporterError::Metrics("Failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance
    ///
    /// Returns None if metrics haven't been initialized yet.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    pub fn record_posted(&self, output: &str, event_type: &str) {
        self.records_posted
            .with_label_values(&[output, event_type])
            .inc();
    }

    /// Record one delivery and how long it took
    pub fn record_forwarded(&self, tag: &str, seconds: f64) {
        self.records_forwarded.with_label_values(&[tag]).inc();
        self.transmit_latency
            .with_label_values(&[tag])
            .observe(seconds);
    }

    pub fn record_dropped(&self, reason: &str, count: u64) {
        self.records_dropped
            .with_label_values(&[reason])
            .inc_by(count as f64);
    }

    pub fn set_queue_depth(&self, tag: &str, depth: usize) {
        self.queue_depth.with_label_values(&[tag]).set(depth as f64);
    }

    pub fn record_rotation(&self) {
        self.file_rotations.inc();
    }
}

/// Gather all metrics and encode as Prometheus text format
///
/// Returns the metrics as a String, ready to be served via HTTP.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

/// Record a posted record if metrics are initialized
pub fn try_record_posted(output: &str, event_type: &str) {
    if let Some(m) = Metrics::get() {
        m.record_posted(output, event_type);
    }
}

/// Record a delivery if metrics are initialized
pub fn try_record_forwarded(tag: &str, seconds: f64) {
    if let Some(m) = Metrics::get() {
        m.record_forwarded(tag, seconds);
    }
}

/// Record dropped records if metrics are initialized
pub fn try_record_dropped(reason: &str, count: u64) {
    if let Some(m) = Metrics::get() {
        m.record_dropped(reason, count);
    }
}

pub fn try_set_queue_depth(tag: &str, depth: usize) {
    if let Some(m) = Metrics::get() {
        m.set_queue_depth(tag, depth);
    }
}

pub fn try_record_rotation() {
    if let Some(m) = Metrics::get() {
        m.record_rotation();
    }
}
