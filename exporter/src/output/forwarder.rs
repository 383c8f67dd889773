//! Buffered forwarding output
//!
//! Records are queued on a bounded channel and delivered by one background
//! worker through a [`Transmit`] capability.
//!
//! ```text
//! post() ──► [ bounded mpsc queue ] ──► delivery worker ──► Transmit::post(tag, record)
//!  (waits only when full)                 (single consumer, FIFO)
//! ```
//!
//! # Example
//!
//! ```ignore
//! let forwarder = NetworkForwarder::connect(&FluentConfig::default(), "app", 1024).await?;
//! forwarder.post(now, "traces", record).await;
//! forwarder.close().await;
//! ```

use crate::error::PluginError;
use crate::metrics;
use crate::output::Output;
use crate::record::Record;
use crate::transmit::{FluentClient, FluentConfig, Transmit};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Output that forwards records to a remote endpoint asynchronously
pub struct NetworkForwarder {
    tag: String,
    capacity: usize,
    /// Producer side of the queue, taken on close
    sender: Mutex<Option<mpsc::Sender<Record>>>,
    /// Delivery worker, joined on close
    worker: Mutex<Option<JoinHandle<()>>>,
    transmit: Arc<dyn Transmit>,
    closed: AtomicBool,
}

impl NetworkForwarder {
    /// Create a forwarder around an existing transmitter
    ///
    /// Spawns the delivery worker on the current tokio runtime. A
    /// `buffer_size` of 0 is raised to 1.
    pub fn new(transmit: Arc<dyn Transmit>, tag: impl Into<String>, buffer_size: usize) -> Self {
        let tag = tag.into();
        let capacity = buffer_size.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        let worker = tokio::spawn(delivery_loop(rx, Arc::clone(&transmit), tag.clone()));

        debug!(
            tag = %tag,
            capacity = capacity,
            transmit = transmit.name(),
            "Forwarder started"
        );

        Self {
            tag,
            capacity,
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            transmit,
            closed: AtomicBool::new(false),
        }
    }

    /// Connect a Fluent client and wrap it in a forwarder
    ///
    /// # Errors
    /// Returns `PluginError::Connection` if the daemon is unreachable and
    /// `async_connect` is off
    pub async fn connect(
        config: &FluentConfig,
        tag: impl Into<String>,
        buffer_size: usize,
    ) -> Result<Self, PluginError> {
        let client = FluentClient::connect(config.clone()).await?;
        Ok(Self::new(Arc::new(client), tag, buffer_size))
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Queue capacity in records
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records waiting for the worker
    pub fn queued(&self) -> usize {
        match self.sender.lock().as_ref() {
            Some(tx) => self.capacity - tx.capacity(),
            None => 0,
        }
    }
}

/// Drain the queue into the transmitter until every sender is gone
async fn delivery_loop(mut rx: mpsc::Receiver<Record>, transmit: Arc<dyn Transmit>, tag: String) {
    while let Some(record) = rx.recv().await {
        let started = Instant::now();
        match transmit.post(&tag, &record).await {
            Ok(()) => {
                metrics::try_record_forwarded(&tag, started.elapsed().as_secs_f64());
            }
            Err(e) => {
                error!(
                    tag = %tag,
                    transmit = transmit.name(),
                    error = %e,
                    record = %record,
                    "Failed to forward record, dropped"
                );
                metrics::try_record_dropped("transmit", 1);
            }
        }
        metrics::try_set_queue_depth(&tag, rx.len());
    }
    debug!(tag = %tag, "Delivery loop drained");
}

#[async_trait]
impl Output for NetworkForwarder {
    fn name(&self) -> &'static str {
        "forwarder"
    }

    async fn post(&self, timestamp: DateTime<FixedOffset>, event_type: &str, mut record: Record) {
        record.stamp_timestamp(&timestamp);
        record.stamp_type(event_type);

        // Clone out of the lock, the send below may wait for queue space
        let sender = self.sender.lock().clone();
        let Some(tx) = sender else {
            warn!(tag = %self.tag, "Post after close, record dropped");
            metrics::try_record_dropped("closed", 1);
            return;
        };

        if tx.send(record).await.is_err() {
            warn!(tag = %self.tag, "Delivery worker gone, record dropped");
            metrics::try_record_dropped("closed", 1);
            return;
        }
        metrics::try_record_posted(self.name(), event_type);
        metrics::try_set_queue_depth(&self.tag, self.queued());
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Half-close: no new records, the worker drains what is queued
        drop(self.sender.lock().take());

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(tag = %self.tag, error = %e, "Delivery worker failed");
            }
        }

        if let Err(e) = self.transmit.close().await {
            error!(tag = %self.tag, error = %e, "Failed to close transmitter");
        }
        info!(tag = %self.tag, "Forwarder closed");
    }
}
