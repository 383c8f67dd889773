//! OTLP/gRPC receiver
//!
//! Adapts the collector `Export` calls for traces, metrics and logs to the
//! matching [`FluentdExporter`] push. A push error fails the call so the
//! sender can decide whether to retry the batch.

use crate::exporter::{Exporters, FluentdExporter};
use opentelemetry_proto::tonic::collector::logs::v1::{
    ExportLogsServiceRequest, ExportLogsServiceResponse,
    logs_service_server::{LogsService, LogsServiceServer},
};
use opentelemetry_proto::tonic::collector::metrics::v1::{
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
    metrics_service_server::{MetricsService, MetricsServiceServer},
};
use opentelemetry_proto::tonic::collector::trace::v1::{
    ExportTraceServiceRequest, ExportTraceServiceResponse,
    trace_service_server::{TraceService, TraceServiceServer},
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tonic::{Request, Response, Status};
use tracing::{debug, error};

/// OTLP service implementation for all three signals
#[derive(Clone)]
pub struct OtlpReceiver {
    traces: Arc<FluentdExporter>,
    metrics: Arc<FluentdExporter>,
    logs: Arc<FluentdExporter>,
    requests: Arc<AtomicU64>,
}

impl OtlpReceiver {
    pub fn new(
        traces: Arc<FluentdExporter>,
        metrics: Arc<FluentdExporter>,
        logs: Arc<FluentdExporter>,
    ) -> Self {
        Self {
            traces,
            metrics,
            logs,
            requests: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_exporters(exporters: &Exporters) -> Self {
        Self::new(
            Arc::clone(&exporters.traces),
            Arc::clone(&exporters.metrics),
            Arc::clone(&exporters.logs),
        )
    }

    /// Export requests handled so far, across signals
    pub fn requests_handled(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn trace_server(&self) -> TraceServiceServer<Self> {
        TraceServiceServer::new(self.clone())
    }

    pub fn metrics_server(&self) -> MetricsServiceServer<Self> {
        MetricsServiceServer::new(self.clone())
    }

    pub fn logs_server(&self) -> LogsServiceServer<Self> {
        LogsServiceServer::new(self.clone())
    }
}

#[tonic::async_trait]
impl TraceService for OtlpReceiver {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> Result<Response<ExportTraceServiceResponse>, Status> {
        let request = request.into_inner();
        debug!(resource_spans = request.resource_spans.len(), "Trace export");
        self.traces.push_traces(&request).await.map_err(|e| {
            error!(error = %e, "Trace export failed");
            Status::from(e)
        })?;
        self.requests.fetch_add(1, Ordering::Relaxed);
        Ok(Response::new(ExportTraceServiceResponse {
            partial_success: None,
        }))
    }
}

#[tonic::async_trait]
impl MetricsService for OtlpReceiver {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> Result<Response<ExportMetricsServiceResponse>, Status> {
        let request = request.into_inner();
        debug!(resource_metrics = request.resource_metrics.len(), "Metrics export");
        self.metrics.push_metrics(&request).await.map_err(|e| {
            error!(error = %e, "Metrics export failed");
            Status::from(e)
        })?;
        self.requests.fetch_add(1, Ordering::Relaxed);
        Ok(Response::new(ExportMetricsServiceResponse {
            partial_success: None,
        }))
    }
}

#[tonic::async_trait]
impl LogsService for OtlpReceiver {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> Result<Response<ExportLogsServiceResponse>, Status> {
        let request = request.into_inner();
        debug!(resource_logs = request.resource_logs.len(), "Logs export");
        self.logs.push_logs(&request).await.map_err(|e| {
            error!(error = %e, "Logs export failed");
            Status::from(e)
        })?;
        self.requests.fetch_add(1, Ordering::Relaxed);
        Ok(Response::new(ExportLogsServiceResponse {
            partial_success: None,
        }))
    }
}
