//! Rotating JSON-lines file output
//!
//! Appends one JSON object per record to `{path}-{bucket}.log`, where the
//! bucket is the current time rendered with a strftime pattern. A new file is
//! opened once the current time bucket expires.
//!
//! ```text
//! path = /var/log/otel, format = %Y-%m-%d-%H, interval = 1h
//!
//! 00:30 ──► /var/log/otel-2023-01-01-00.log   (expires 01:00)
//! 00:59 ──► /var/log/otel-2023-01-01-00.log
//! 01:05 ──► /var/log/otel-2023-01-01-01.log   (expires 02:00)
//! ```

use crate::clock::{Clock, SystemClock};
use crate::error::{ExporterError, Result};
use crate::metrics;
use crate::output::Output;
use crate::record::{Record, TIMESTAMP_FIELD, format_timestamp};
use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Default rotation interval (one hour)
const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

/// The file currently receiving appends
struct OpenBucket {
    file: File,
    path: PathBuf,
    expires_at: DateTime<Utc>,
}

impl OpenBucket {
    fn close(mut self) {
        if let Err(e) = self.file.flush() {
            error!(path = %self.path.display(), error = %e, "Failed to flush log file");
        }
        debug!(path = %self.path.display(), "Closed log file");
    }
}

/// File output rotating on a fixed time bucket
///
/// Owns at most one open file. Posts are serialized internally.
///
/// Opening and writing use blocking `std::fs` calls on the posting task
/// while the writer's lock is held. One short line per post keeps that cheap,
/// but a slow disk stalls the executor thread for the duration.
pub struct RotatingFileWriter {
    path: PathBuf,
    time_format: String,
    uid: Option<u32>,
    gid: Option<u32>,
    interval: Duration,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<OpenBucket>>,
}

impl RotatingFileWriter {
    /// Create a writer for `{path}-{time_format}.log` files
    ///
    /// `time_format` is a strftime pattern such as `%Y-%m-%d-%H`. Ownership
    /// is applied best-effort to every new file when `uid` or `gid` is set.
    /// No file is opened until the first post.
    ///
    /// # Errors
    /// Returns `ExporterError::Config` if the pattern is invalid or the
    /// parent directory of `path` does not exist
    pub fn new(
        path: impl Into<PathBuf>,
        time_format: impl Into<String>,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> Result<Self> {
        let path = path.into();
        let time_format = time_format.into();

        if StrftimeItems::new(&time_format).any(|item| matches!(item, Item::Error)) {
            return Err(ExporterError::Config(format!(
                "invalid file time format '{time_format}'"
            )));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(ExporterError::Config(format!(
                    "log directory '{}' does not exist",
                    parent.display()
                )));
            }
        }

        Ok(Self {
            path,
            time_format,
            uid,
            gid,
            interval: DEFAULT_INTERVAL,
            clock: Arc::new(SystemClock),
            current: Mutex::new(None),
        })
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the bucket granularity (at least one second)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_secs(1));
        self
    }

    /// Path of the file currently open, if any
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current.lock().as_ref().map(|bucket| bucket.path.clone())
    }

    /// File name for the bucket containing `now`
    fn bucket_path(&self, now: &DateTime<FixedOffset>) -> Result<PathBuf> {
        let mut name = self.path.as_os_str().to_os_string();
        let mut suffix = String::from("-");
        write!(suffix, "{}", now.format(&self.time_format))
            .map_err(|_| ExporterError::Config(format!("cannot format '{}'", self.time_format)))?;
        suffix.push_str(".log");
        name.push(suffix);
        Ok(PathBuf::from(name))
    }

    /// End of the bucket containing `now`: `truncate(now, interval) + interval`
    fn bucket_expiry(&self, now: &DateTime<FixedOffset>) -> DateTime<Utc> {
        let step = i64::try_from(self.interval.as_secs()).unwrap_or(i64::MAX).max(1);
        let secs = now.timestamp();
        let start = secs - secs.rem_euclid(step);
        DateTime::from_timestamp(start.saturating_add(step), 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn open_bucket(&self, now: &DateTime<FixedOffset>) -> Result<OpenBucket> {
        let path = self.bucket_path(now)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        set_owner(&path, self.uid, self.gid);

        Ok(OpenBucket {
            file,
            path,
            expires_at: self.bucket_expiry(now),
        })
    }

    /// Render one line: `@timestamp` first, then every other field
    fn render_line(timestamp: &str, record: &Record) -> String {
        let mut line = String::with_capacity(64 + record.len() * 16);
        line.push_str("{\"");
        line.push_str(TIMESTAMP_FIELD);
        line.push_str("\":");
        line.push_str(&serde_json::to_string(timestamp).unwrap_or_default());
        for (key, value) in record.iter() {
            if key == TIMESTAMP_FIELD {
                continue;
            }
            line.push(',');
            line.push_str(&serde_json::to_string(key).unwrap_or_default());
            line.push(':');
            line.push_str(&serde_json::to_string(value).unwrap_or_else(|_| "null".to_string()));
        }
        line.push_str("}\n");
        line
    }
}

/// Apply file ownership, ignoring failures
#[cfg(unix)]
fn set_owner(path: &Path, uid: Option<u32>, gid: Option<u32>) {
    if uid.is_none() && gid.is_none() {
        return;
    }
    if let Err(e) = std::os::unix::fs::chown(path, uid, gid) {
        debug!(path = %path.display(), error = %e, "chown failed, ignored");
    }
}

#[cfg(not(unix))]
fn set_owner(_path: &Path, _uid: Option<u32>, _gid: Option<u32>) {}

#[async_trait]
impl Output for RotatingFileWriter {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn post(&self, timestamp: DateTime<FixedOffset>, event_type: &str, mut record: Record) {
        let formatted = format_timestamp(&timestamp);
        record.insert(TIMESTAMP_FIELD, formatted.clone());
        record.stamp_type(event_type);
        let line = Self::render_line(&formatted, &record);

        let now = self.clock.now();
        let mut current = self.current.lock();

        let expired = current
            .as_ref()
            .is_none_or(|bucket| now >= bucket.expires_at);
        if expired {
            match self.open_bucket(&now) {
                Ok(bucket) => {
                    info!(path = %bucket.path.display(), "Opened log file");
                    metrics::try_record_rotation();
                    if let Some(previous) = current.replace(bucket) {
                        previous.close();
                    }
                }
                Err(e) => {
                    error!(
                        path = %self.path.display(),
                        error = %e,
                        "Failed to open log file, record dropped"
                    );
                    metrics::try_record_dropped("file_open", 1);
                    return;
                }
            }
        }

        let Some(bucket) = current.as_mut() else {
            return;
        };
        if let Err(e) = bucket.file.write_all(line.as_bytes()) {
            error!(path = %bucket.path.display(), error = %e, "Failed to write log line");
            metrics::try_record_dropped("file_write", 1);
            return;
        }
        metrics::try_record_posted(self.name(), event_type);
    }

    async fn close(&self) {
        if let Some(bucket) = self.current.lock().take() {
            bucket.close();
        }
    }
}
