//! Output throughput benchmarks
//!
//! Measures post cost of the in-memory capture and of the forwarder queue
//! with a transmitter that does no I/O.

use async_trait::async_trait;
use chrono::Utc;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use fluentd_exporter::{MemoryCapture, NetworkForwarder, Output, PluginError, Record, Transmit};
use std::sync::Arc;

struct NullTransmit;

#[async_trait]
impl Transmit for NullTransmit {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn post(&self, _tag: &str, _record: &Record) -> Result<(), PluginError> {
        Ok(())
    }
}

fn make_record(i: usize) -> Record {
    Record::new()
        .with_field("seq", i)
        .with_field("resource spans", 1)
        .with_field("traces", "ResourceSpans #0\nSpan #0\n    Name           : bench\n")
}

fn bench_memory_capture(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("memory_capture");

    for batch_size in [1, 100, 1000] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_function(format!("post_{batch_size}"), |b| {
            b.to_async(&rt).iter(|| async move {
                let capture = MemoryCapture::new();
                let now = Utc::now().fixed_offset();
                for i in 0..batch_size {
                    capture.post(now, "traces", make_record(i)).await;
                }
                capture.len()
            })
        });
    }

    group.finish();
}

fn bench_forwarder(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("forwarder");

    for queue_size in [1, 64, 1024] {
        group.throughput(Throughput::Elements(1000));
        group.bench_function(format!("queue_{queue_size}"), |b| {
            b.to_async(&rt).iter(|| async move {
                let forwarder = NetworkForwarder::new(Arc::new(NullTransmit), "bench", queue_size);
                let now = Utc::now().fixed_offset();
                for i in 0..1000 {
                    forwarder.post(now, "traces", make_record(i)).await;
                }
                forwarder.close().await;
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_memory_capture, bench_forwarder);
criterion_main!(benches);
