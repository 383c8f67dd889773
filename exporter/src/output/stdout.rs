//! Stdout output for debugging
//!
//! Prints records to stdout as `timestamp key:json key:json ...`.
//! Useful for development and debugging.

use crate::metrics;
use crate::output::Output;
use crate::record::{Record, format_timestamp};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stdout output - prints records for debugging
pub struct ConsoleWriter {
    /// Count of records written
    posted_count: AtomicU64,
}

impl ConsoleWriter {
    /// Create a new ConsoleWriter
    pub fn new() -> Self {
        Self {
            posted_count: AtomicU64::new(0),
        }
    }

    /// Get total records written
    pub fn posted_count(&self) -> u64 {
        self.posted_count.load(Ordering::Relaxed)
    }

    /// Write one record in console form
    fn write_record<W: Write>(out: &mut W, timestamp: &str, record: &Record) {
        write!(out, "{timestamp} ").ok();
        for (key, value) in record.iter() {
            let json = serde_json::to_string(value).unwrap_or_default();
            write!(out, " {key}:{json}").ok();
        }
        writeln!(out).ok();
    }
}

impl Default for ConsoleWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Output for ConsoleWriter {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn post(&self, timestamp: DateTime<FixedOffset>, event_type: &str, mut record: Record) {
        let formatted = format_timestamp(&timestamp);
        record.stamp_type(event_type);

        let mut stdout = std::io::stdout().lock();
        Self::write_record(&mut stdout, &formatted, &record);

        self.posted_count.fetch_add(1, Ordering::Relaxed);
        metrics::try_record_posted(self.name(), event_type);
    }

    async fn close(&self) {}
}
