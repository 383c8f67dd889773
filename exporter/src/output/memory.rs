//! In-memory capture output for tests
//!
//! Keeps every posted record in order so tests can assert exact field values.

use crate::output::Output;
use crate::record::Record;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use std::fmt;

/// A record as it was posted
#[derive(Debug, Clone)]
pub struct CapturedRecord {
    pub timestamp: DateTime<FixedOffset>,
    pub event_type: String,
    pub record: Record,
}

/// Output that accumulates records for inspection
///
/// Unbounded. Safe to post from concurrent tasks.
#[derive(Debug, Default)]
pub struct MemoryCapture {
    records: Mutex<Vec<CapturedRecord>>,
}

impl MemoryCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Snapshot of everything captured so far
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records.lock().clone()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    /// Pretty-printed JSON of every captured record, one after another
    pub fn render(&self) -> String {
        let records = self.records.lock();
        records
            .iter()
            .map(|captured| serde_json::to_string_pretty(&captured.record).unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// String form of field `key` in the `index`-th captured record
    ///
    /// Returns an empty string when the index is out of range, the field is
    /// absent, or its value is null. Strings come back verbatim; every other
    /// value is JSON-encoded.
    pub fn field(&self, index: usize, key: &str) -> String {
        let records = self.records.lock();
        match records.get(index).and_then(|c| c.record.get(key)) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => serde_json::to_string_pretty(other).unwrap_or_default(),
        }
    }
}

impl fmt::Display for MemoryCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[async_trait]
impl Output for MemoryCapture {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn post(&self, timestamp: DateTime<FixedOffset>, event_type: &str, mut record: Record) {
        record.stamp_type(event_type);
        self.records.lock().push(CapturedRecord {
            timestamp,
            event_type: event_type.to_string(),
            record,
        });
    }

    async fn close(&self) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::TIMESTAMP_FIELD;
    use serde_json::json;
    use std::sync::Arc;

    fn ts() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2023-01-01T00:30:00Z").unwrap()
    }

    #[tokio::test]
    async fn test_capture_preserves_order() {
        let capture = MemoryCapture::new();
        for i in 0..3 {
            capture
                .post(ts(), "demo", Record::new().with_field("seq", i))
                .await;
        }

        assert_eq!(capture.len(), 3);
        assert_eq!(capture.field(0, "seq"), "0");
        assert_eq!(capture.field(2, "seq"), "2");
    }

    #[tokio::test]
    async fn test_injects_type_only() {
        let capture = MemoryCapture::new();
        capture.post(ts(), "span", Record::new()).await;

        assert_eq!(capture.field(0, "type"), "span");
        assert_eq!(capture.field(0, TIMESTAMP_FIELD), "");
        let captured = &capture.records()[0];
        assert_eq!(captured.event_type, "span");
        assert_eq!(captured.timestamp, ts());
    }

    #[tokio::test]
    async fn test_field_rules() {
        let capture = MemoryCapture::new();
        capture
            .post(
                ts(),
                "demo",
                Record::new()
                    .with_field("s", "verbatim \"text\"")
                    .with_field("n", 42)
                    .with_field("b", false)
                    .with_field("nil", serde_json::Value::Null)
                    .with_field("list", json!([1, 2])),
            )
            .await;

        assert_eq!(capture.field(0, "s"), "verbatim \"text\"");
        assert_eq!(capture.field(0, "n"), "42");
        assert_eq!(capture.field(0, "b"), "false");
        assert_eq!(capture.field(0, "nil"), "");
        assert_eq!(capture.field(0, "list"), "[\n  1,\n  2\n]");
        assert_eq!(capture.field(0, "absent"), "");
        assert_eq!(capture.field(1, "s"), "");
    }

    #[tokio::test]
    async fn test_render_joins_pretty_records() {
        let capture = MemoryCapture::new();
        capture
            .post(ts(), "a", Record::new().with_field("x", 1))
            .await;
        capture.post(ts(), "b", Record::new()).await;

        let expected = "{\n  \"type\": \"a\",\n  \"x\": 1\n}\n{\n  \"type\": \"b\"\n}";
        assert_eq!(capture.render(), expected);
        assert_eq!(capture.to_string(), expected);
    }

    #[tokio::test]
    async fn test_concurrent_posts() {
        let capture = Arc::new(MemoryCapture::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let capture = Arc::clone(&capture);
            handles.push(tokio::spawn(async move {
                capture
                    .post(ts(), "concurrent", Record::new().with_field("task", i))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(capture.len(), 8);

        capture.clear();
        assert!(capture.is_empty());
    }
}
