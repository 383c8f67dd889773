//! Fluentd Forward protocol client
//!
//! Sends records in Message mode, one MessagePack array per record:
//!
//! ```text
//! [ tag: str, time: uint (unix seconds), record: map ]
//! ```
//!
//! See <https://github.com/fluent/fluentd/wiki/Forward-Protocol-Specification-v1>.
//!
//! # Example
//!
//! ```ignore
//! let client = FluentClient::connect(FluentConfig {
//!     host: "fluentd".into(),
//!     ..Default::default()
//! })
//! .await?;
//! client.post("app", &record).await?;
//! ```

use crate::error::PluginError;
use crate::record::Record;
use crate::transmit::Transmit;
use crate::transmit::retry::BackoffConfig;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default Fluentd forward port
pub const DEFAULT_PORT: u16 = 24224;

/// Default connect timeout (3 seconds)
const DEFAULT_TIMEOUT_MS: u64 = 3_000;

/// Default cap on one encoded message (8 MiB)
const DEFAULT_BUFFER_LIMIT: usize = 8 * 1024 * 1024;

/// Connection and retry settings for [`FluentClient`]
#[derive(Debug, Clone)]
pub struct FluentConfig {
    pub host: String,
    pub port: u16,
    /// Connect timeout
    pub timeout: Duration,
    /// Write timeout, zero disables it
    pub write_timeout: Duration,
    /// Largest encoded message accepted, in bytes
    pub buffer_limit: usize,
    /// Delay before the first reconnect attempt
    pub retry_wait: Duration,
    /// Reconnect attempts before a record is given up
    pub max_retry: u32,
    /// Upper bound for the reconnect delay
    pub max_retry_wait: Duration,
    /// Prepended to every tag as `prefix.tag` when non-empty
    pub tag_prefix: String,
    /// Defer the first dial to the first post instead of failing at connect time
    pub async_connect: bool,
}

impl Default for FluentConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            write_timeout: Duration::ZERO,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
            retry_wait: Duration::from_millis(500),
            max_retry: 13,
            max_retry_wait: Duration::from_secs(60),
            tag_prefix: String::new(),
            async_connect: false,
        }
    }
}

impl FluentConfig {
    /// `host:port` of the daemon
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Forward protocol client over a persistent TCP connection
pub struct FluentClient {
    config: FluentConfig,
    backoff: BackoffConfig,
    /// Live connection, `None` until dialed or after a failure
    conn: Mutex<Option<TcpStream>>,
}

impl FluentClient {
    /// Plugin name used in logs and errors
    pub const NAME: &'static str = "fluent";

    /// Create a client and dial the daemon
    ///
    /// With `async_connect` the dial happens on the first post instead.
    ///
    /// # Errors
    /// Returns `PluginError::Connection` if the daemon cannot be reached
    pub async fn connect(config: FluentConfig) -> Result<Self, PluginError> {
        let client = Self {
            backoff: BackoffConfig::from(&config),
            config,
            conn: Mutex::new(None),
        };

        if !client.config.async_connect {
            let stream = client.dial().await?;
            *client.conn.lock().await = Some(stream);
            debug!(address = %client.config.address(), "Fluent client connected");
        }

        Ok(client)
    }

    pub fn config(&self) -> &FluentConfig {
        &self.config
    }

    /// Tag as sent on the wire
    pub fn full_tag(&self, tag: &str) -> String {
        if self.config.tag_prefix.is_empty() {
            tag.to_string()
        } else {
            format!("{}.{}", self.config.tag_prefix, tag)
        }
    }

    /// Encode one Message mode entry
    pub fn encode(&self, tag: &str, time: u64, record: &Record) -> Result<Vec<u8>, PluginError> {
        let data = rmp_serde::to_vec(&(self.full_tag(tag), time, record))?;
        if data.len() > self.config.buffer_limit {
            return Err(PluginError::Send(format!(
                "encoded record is {} bytes, buffer limit is {}",
                data.len(),
                self.config.buffer_limit
            )));
        }
        Ok(data)
    }

    async fn dial(&self) -> Result<TcpStream, PluginError> {
        let address = self.config.address();
        let stream = tokio::time::timeout(self.config.timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| {
                PluginError::Connection(format!(
                    "timed out connecting to {address} after {:?}",
                    self.config.timeout
                ))
            })?
            .map_err(|e| PluginError::Connection(format!("failed to connect to {address}: {e}")))?;
        stream.set_nodelay(true).ok();
        Ok(stream)
    }

    async fn write_once(&self, conn: &mut Option<TcpStream>, data: &[u8]) -> Result<(), PluginError> {
        if conn.is_none() {
            *conn = Some(self.dial().await?);
        }
        let stream = conn.as_mut().ok_or(PluginError::NotReady)?;

        if self.config.write_timeout.is_zero() {
            stream
                .write_all(data)
                .await
                .map_err(|e| PluginError::Send(format!("write failed: {e}")))?;
        } else {
            tokio::time::timeout(self.config.write_timeout, stream.write_all(data))
                .await
                .map_err(|_| PluginError::Send("write timed out".to_string()))?
                .map_err(|e| PluginError::Send(format!("write failed: {e}")))?;
        }
        Ok(())
    }

    /// Write `data`, reconnecting with backoff on failure
    ///
    /// Delivery is at most once. A write accepted by the kernel just before
    /// the peer reset the connection reports success and is lost; only the
    /// next failing write triggers the reconnect.
    async fn write_with_retry(&self, data: &[u8]) -> Result<(), PluginError> {
        let mut conn = self.conn.lock().await;
        let mut attempt = 0;

        loop {
            match self.write_once(&mut conn, data).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    // The stream may hold a partial write, never reuse it
                    *conn = None;
                    if attempt >= self.backoff.max_attempts {
                        return Err(PluginError::Send(format!(
                            "giving up after {} retries: {e}",
                            attempt
                        )));
                    }
                    let delay = self.backoff.delay_for(attempt);
                    warn!(
                        address = %self.config.address(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fluent write failed, reconnecting"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl Transmit for FluentClient {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn post(&self, tag: &str, record: &Record) -> Result<(), PluginError> {
        let time = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        let data = self.encode(tag, time, record)?;
        self.write_with_retry(&data).await
    }

    async fn close(&self) -> Result<(), PluginError> {
        let stream = self.conn.lock().await.take();
        if let Some(mut stream) = stream {
            stream
                .shutdown()
                .await
                .map_err(|e| PluginError::Shutdown(e.to_string()))?;
            debug!(address = %self.config.address(), "Fluent client closed");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::io::Cursor;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn decode_all(bytes: &[u8]) -> Vec<(String, u64, Value)> {
        let mut cursor = Cursor::new(bytes);
        let mut out = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            out.push(rmp_serde::from_read(&mut cursor).unwrap());
        }
        out
    }

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    fn config(port: u16) -> FluentConfig {
        FluentConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout: Duration::from_secs(1),
            retry_wait: Duration::from_millis(1),
            max_retry: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_full_tag_prefix() {
        let cfg = FluentConfig {
            tag_prefix: "otel".to_string(),
            ..Default::default()
        };
        let client = FluentClient {
            backoff: BackoffConfig::from(&cfg),
            config: cfg,
            conn: Mutex::new(None),
        };
        assert_eq!(client.full_tag("app.trace"), "otel.app.trace");
    }

    #[test]
    fn test_encode_message_mode() {
        let cfg = FluentConfig::default();
        let client = FluentClient {
            backoff: BackoffConfig::from(&cfg),
            config: cfg,
            conn: Mutex::new(None),
        };
        let record = Record::new().with_field("a", 1).with_field("type", "demo");

        let data = client.encode("app", 1_700_000_000, &record).unwrap();
        let decoded = decode_all(&data);

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].0, "app");
        assert_eq!(decoded[0].1, 1_700_000_000);
        assert_eq!(decoded[0].2, json!({"a": 1, "type": "demo"}));
    }

    #[test]
    fn test_encode_rejects_oversized() {
        let cfg = FluentConfig {
            buffer_limit: 16,
            ..Default::default()
        };
        let client = FluentClient {
            backoff: BackoffConfig::from(&cfg),
            config: cfg,
            conn: Mutex::new(None),
        };
        let record = Record::new().with_field("blob", "x".repeat(64));
        assert!(matches!(
            client.encode("app", 0, &record),
            Err(PluginError::Send(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let result = FluentClient::connect(config(1)).await;
        assert!(matches!(result, Err(PluginError::Connection(_))));
    }

    #[tokio::test]
    async fn test_async_connect_defers_dial() {
        let cfg = FluentConfig {
            async_connect: true,
            ..config(1)
        };
        let client = FluentClient::connect(cfg).await.unwrap();

        // Nothing listens on port 1, so the first post fails after retries
        let result = client.post("app", &Record::new()).await;
        assert!(matches!(result, Err(PluginError::Send(_))));
    }

    #[tokio::test]
    async fn test_post_delivers_records() {
        let (listener, port) = listener().await;
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            decode_all(&buf)
        });

        let client = FluentClient::connect(config(port)).await.unwrap();
        client
            .post("app", &Record::new().with_field("seq", 1))
            .await
            .unwrap();
        client
            .post("app", &Record::new().with_field("seq", 2))
            .await
            .unwrap();
        client.close().await.unwrap();
        client.close().await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].0, "app");
        assert_eq!(received[0].2["seq"], json!(1));
        assert_eq!(received[1].2["seq"], json!(2));
        assert!(received[0].1 > 0);
    }

    #[tokio::test]
    async fn test_reconnects_after_peer_drop() {
        let (listener, port) = listener().await;
        let (dropped_tx, dropped_rx) = tokio::sync::oneshot::channel();
        let server = tokio::spawn(async move {
            let (mut first, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];
            let n = first.read(&mut buf).await.unwrap();
            drop(first);
            dropped_tx.send(()).unwrap();

            let (mut second, _) = listener.accept().await.unwrap();
            let mut rest = Vec::new();
            second.read_to_end(&mut rest).await.unwrap();
            (decode_all(&buf[..n]), decode_all(&rest))
        });

        let client = FluentClient::connect(config(port)).await.unwrap();
        client
            .post("app", &Record::new().with_field("seq", 1))
            .await
            .unwrap();
        dropped_rx.await.unwrap();

        for seq in 2..=5 {
            client
                .post("app", &Record::new().with_field("seq", seq))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        client.close().await.unwrap();

        let (before, after) = server.await.unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].2["seq"], json!(1));

        // Records written after the reset arrive on the new connection
        assert!(!after.is_empty());
        assert!(after.iter().all(|(tag, _, r)| tag == "app" && r["seq"].as_u64() >= Some(2)));
        assert_eq!(after.last().unwrap().2["seq"], json!(5));
    }
}
