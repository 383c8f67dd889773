//! Fluentd exporter for OpenTelemetry
//!
//! Receives OTLP traces, metrics and logs, summarizes each export request
//! into a flat record and hands it to a pluggable output. The production
//! output forwards to a Fluentd daemon over the Forward protocol; file,
//! console and in-memory outputs cover local use and tests.
//!
//! # Architecture
//!
//! ```text
//! OTLP gRPC ──► FluentdExporter ──► Output ──► NetworkForwarder ──► Fluentd
//!              (count + render)             ├─► RotatingFileWriter
//!                                           ├─► ConsoleWriter
//!                                           └─► MemoryCapture
//! ```
//!
//! Outputs and transmitters are pluggable via traits.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod clock;
pub mod config;
pub mod error;
pub mod exporter;
pub mod metrics;
pub mod metrics_server;
pub mod output;
pub mod record;
pub mod server;
pub mod transmit;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ExporterConfig, LogFormat};
pub use error::{ExporterError, PluginError, Result};
pub use exporter::{Exporters, FluentdExporter, Signal, create_exporter, create_exporters};
pub use output::{ConsoleWriter, MemoryCapture, NetworkForwarder, Output, RotatingFileWriter};
pub use record::{Record, Value};
pub use transmit::{FluentClient, FluentConfig, Transmit};
