//! Output system for the exporter
//!
//! Outputs accept [`Record`]s and deliver them somewhere: a Fluentd daemon,
//! a rotating JSON-lines file, stdout, or an in-memory buffer for tests.

pub mod file;
pub mod forwarder;
pub mod memory;
pub mod stdout;

use crate::record::Record;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

pub use file::RotatingFileWriter;
pub use forwarder::NetworkForwarder;
pub use memory::{CapturedRecord, MemoryCapture};
pub use stdout::ConsoleWriter;

/// Output trait - accepts Records for delivery
///
/// `post` is fire-and-forget: it has no error path and never waits for a
/// network round trip. Delivery failures are logged and counted inside the
/// output. Every output sets the `type` field of the record to `event_type`.
///
/// # Example
///
/// ```ignore
/// struct CountingOutput {
///     count: AtomicU64,
/// }
///
/// #[async_trait]
/// impl Output for CountingOutput {
///     fn name(&self) -> &'static str { "counting" }
///
///     async fn post(&self, _: DateTime<FixedOffset>, _: &str, _: Record) {
///         self.count.fetch_add(1, Ordering::Relaxed);
///     }
///
///     async fn close(&self) {}
/// }
/// ```
#[async_trait]
pub trait Output: Send + Sync {
    /// Output name for identification and logging
    fn name(&self) -> &'static str;

    /// Hand a record to the output
    ///
    /// # Arguments
    /// * `timestamp` - Event time, rendered into `@timestamp` by outputs that add it
    /// * `event_type` - Value of the injected `type` field
    /// * `record` - The event; owned by the output from here on
    async fn post(&self, timestamp: DateTime<FixedOffset>, event_type: &str, record: Record);

    /// Release everything the output owns
    ///
    /// Buffered outputs drain before returning. Calling `close` twice is a no-op.
    /// Posting after `close` is not supported.
    async fn close(&self);
}
