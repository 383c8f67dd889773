//! Record type for the exporter
//!
//! A [`Record`] is one emitted event: a map from field names to structured
//! JSON values. It is the unit every [`Output`](crate::output::Output) accepts.
//!
//! # Ownership
//!
//! ```text
//! caller builds Record
//!        │
//!        ▼  post(timestamp, event_type, record)   ← moved, not borrowed
//! sink injects "type" (and "@timestamp")
//!        │
//!        ▼
//! queue / file line / stdout / capture buffer
//! ```

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::fmt;

pub use serde_json::Value;

/// Reserved field holding the event type passed to `post`
pub const TYPE_FIELD: &str = "type";

/// Reserved field holding the formatted event timestamp
pub const TIMESTAMP_FIELD: &str = "@timestamp";

/// One structured event
///
/// Keys iterate in sorted order, so serialization is deterministic.
///
/// # Example
///
/// ```
/// use fluentd_exporter::record::Record;
///
/// let record = Record::new()
///     .with_field("spans", 3)
///     .with_field("service", "checkout");
/// assert_eq!(record.len(), 2);
/// assert_eq!(record.get("spans"), Some(&3.into()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Add a field, builder style
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a field, returning the previous value if there was one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrow the underlying JSON map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Inject the reserved `type` field
    pub(crate) fn stamp_type(&mut self, event_type: &str) {
        self.insert(TYPE_FIELD, event_type);
    }

    /// Inject the reserved `@timestamp` field
    pub(crate) fn stamp_timestamp(&mut self, timestamp: &DateTime<FixedOffset>) {
        self.insert(TIMESTAMP_FIELD, format_timestamp(timestamp));
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Compact JSON, used when a dropped record is logged
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("{}"),
        }
    }
}

/// Format a timestamp as `YYYY-MM-DDTHH:mm:ss.SSS±HH:MM`
///
/// A zero offset is written as `Z`.
///
/// ```
/// use chrono::DateTime;
/// use fluentd_exporter::record::format_timestamp;
///
/// let t = DateTime::parse_from_rfc3339("2023-01-01T00:30:00+00:00").unwrap();
/// assert_eq!(format_timestamp(&t), "2023-01-01T00:30:00.000Z");
/// ```
pub fn format_timestamp(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_builder() {
        let record = Record::new()
            .with_field("a", 1)
            .with_field("b", "two")
            .with_field("c", json!({"nested": [1, 2]}));

        assert_eq!(record.len(), 3);
        assert_eq!(record.get("a"), Some(&json!(1)));
        assert_eq!(record.get("b"), Some(&json!("two")));
        assert_eq!(record.get("c"), Some(&json!({"nested": [1, 2]})));
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let mut record = Record::new().with_field("type", "user");
        let previous = record.insert("type", "sink");
        assert_eq!(previous, Some(json!("user")));
        assert_eq!(record.get("type"), Some(&json!("sink")));
    }

    #[test]
    fn test_display_is_sorted_json() {
        let record = Record::new().with_field("zeta", true).with_field("alpha", 1);
        assert_eq!(record.to_string(), r#"{"alpha":1,"zeta":true}"#);
    }

    #[test]
    fn test_serializes_as_map() {
        let record = Record::new().with_field("k", "v");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"k": "v"}));

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_stamp_reserved_fields() {
        let ts = DateTime::parse_from_rfc3339("2024-05-06T07:08:09.123+02:00").unwrap();
        let mut record = Record::new();
        record.stamp_type("demo");
        record.stamp_timestamp(&ts);

        assert_eq!(record.get(TYPE_FIELD), Some(&json!("demo")));
        assert_eq!(
            record.get(TIMESTAMP_FIELD),
            Some(&json!("2024-05-06T07:08:09.123+02:00"))
        );
    }

    #[test]
    fn test_format_timestamp_offsets() {
        let utc = DateTime::parse_from_rfc3339("2023-01-01T00:30:00Z").unwrap();
        assert_eq!(format_timestamp(&utc), "2023-01-01T00:30:00.000Z");

        let west = DateTime::parse_from_rfc3339("2023-01-01T00:30:00.5-05:00").unwrap();
        assert_eq!(format_timestamp(&west), "2023-01-01T00:30:00.500-05:00");
    }

    #[test]
    fn test_from_iterator() {
        let record: Record = vec![("x", json!(1)), ("y", json!(null))]
            .into_iter()
            .collect();
        assert_eq!(record.len(), 2);
        assert!(record.contains_key("y"));
    }
}
