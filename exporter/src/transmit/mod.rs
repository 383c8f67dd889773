//! Transmit system for the exporter
//!
//! A transmitter delivers one tagged [`Record`] to a remote endpoint. The
//! [`NetworkForwarder`](crate::output::NetworkForwarder) output owns one and
//! calls it from its delivery worker. Connection handling, timeouts and
//! retry/backoff all live behind this trait.

pub mod fluent;
pub mod retry;

use crate::error::PluginError;
use crate::record::Record;
use async_trait::async_trait;

pub use fluent::{FluentClient, FluentConfig};
pub use retry::BackoffConfig;

/// Transmit trait - delivers a tagged record to a remote endpoint
///
/// # Example
///
/// ```ignore
/// struct LogTransmit;
///
/// #[async_trait]
/// impl Transmit for LogTransmit {
///     fn name(&self) -> &'static str { "log" }
///
///     async fn post(&self, tag: &str, record: &Record) -> Result<(), PluginError> {
///         tracing::info!(%tag, %record, "would transmit");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Transmit: Send + Sync {
    /// Transmitter name for identification and logging
    fn name(&self) -> &'static str;

    /// Deliver one record under `tag`
    ///
    /// Blocks until the record is written or the transmitter gives up.
    async fn post(&self, tag: &str, record: &Record) -> Result<(), PluginError>;

    /// Release the connection
    ///
    /// Called once the forwarder has drained its queue.
    async fn close(&self) -> Result<(), PluginError> {
        Ok(())
    }
}
