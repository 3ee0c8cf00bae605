//! Telemetry backed by the `tracing` and `metrics` facades.
//!
//! # Responsibilities
//! - Create spans for proxy operations, continuing inbound W3C traces
//! - Emit structured log events through `tracing`
//! - Hand out request logging and metering middleware
//!
//! # Design Decisions
//! - Span fields are declared up front; attributes with other keys are dropped
//! - The exporter behind `tracing`/`metrics` is chosen by the binary, not here
//! - Log events are plain `tracing` events; the caller emits them inside the
//!   request span (`Span::in_scope`) so they carry its fields

use std::sync::Arc;

use tracing::field::Empty;

use super::logging::RequestLogging;
use super::metrics::{RequestDuration, RequestsInFlight};
use super::propagation::TraceContext;
use super::telemetry::{Attribute, RequestEvent, Span, SpanStatus, Telemetry};
use crate::config::TelemetryConfig;
use crate::http::middleware::Middleware;

/// Telemetry emitting through `tracing` and `metrics`.
#[derive(Debug, Clone)]
pub struct TracingTelemetry {
    service_name: String,
    service_version: String,
}

impl TracingTelemetry {
    pub fn new(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: service_version.into(),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(&config.service_name, &config.service_version)
    }

    pub fn service_version(&self) -> &str {
        &self.service_version
    }
}

/// A span recorded as a `tracing` span.
#[derive(Debug)]
pub struct TracingSpan {
    span: tracing::Span,
    context: TraceContext,
    status: SpanStatus,
}

impl TracingSpan {
    pub fn status(&self) -> &SpanStatus {
        &self.status
    }
}

impl Span for TracingSpan {
    fn context(&self) -> Option<&TraceContext> {
        Some(&self.context)
    }

    fn set_attributes(&mut self, attributes: &[Attribute]) {
        for attribute in attributes {
            self.span.record(attribute.key, attribute.value.as_str());
        }
    }

    fn record_error(&mut self, error: &(dyn std::error::Error + 'static)) {
        self.span.record("error", tracing::field::display(error));
    }

    fn set_status(&mut self, status: SpanStatus) {
        let code = match &status {
            SpanStatus::Unset => "UNSET",
            SpanStatus::Ok => "OK",
            SpanStatus::Error(_) => "ERROR",
        };
        self.span.record("otel.status_code", code);
        if let SpanStatus::Error(description) = &status {
            self.span.record("otel.status_description", description.as_str());
        }
        self.status = status;
    }

    fn in_scope(&self, f: &mut dyn FnMut()) {
        self.span.in_scope(f)
    }

    fn end(self: Box<Self>) {
        tracing::trace!(parent: &self.span, status = ?self.status, "Span ended");
    }
}

impl Telemetry for TracingTelemetry {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn start_span(&self, name: &'static str, parent: Option<TraceContext>) -> Box<dyn Span> {
        let parent_span_id = parent.as_ref().map(TraceContext::span_id_hex);
        let context = match parent {
            Some(parent) => parent.child(),
            None => TraceContext::root(),
        };

        let span = tracing::info_span!(
            "gateway",
            otel.name = name,
            service.name = %self.service_name,
            trace_id = %context.trace_id_hex(),
            span_id = %context.span_id_hex(),
            parent_span_id = parent_span_id.as_deref(),
            http.method = Empty,
            http.target = Empty,
            http.status_code = Empty,
            http.client_ip = Empty,
            gateway.prefix = Empty,
            gateway.backend = Empty,
            gateway.latency_ms = Empty,
            error = Empty,
            otel.status_code = Empty,
            otel.status_description = Empty,
        );

        Box::new(TracingSpan {
            span,
            context,
            status: SpanStatus::Unset,
        })
    }

    fn log_info(&self, message: &str, event: &RequestEvent<'_>) {
        tracing::info!(
            service = %self.service_name,
            method = %event.method,
            path = event.path,
            prefix = event.prefix,
            backend = event.backend,
            status = event.status.map(|s| s.as_u16()),
            latency_ms = event.latency_ms(),
            "{message}"
        );
    }

    fn log_error(
        &self,
        message: &str,
        event: &RequestEvent<'_>,
        error: &(dyn std::error::Error + 'static),
    ) {
        tracing::error!(
            service = %self.service_name,
            method = %event.method,
            path = event.path,
            prefix = event.prefix,
            backend = event.backend,
            status = event.status.map(|s| s.as_u16()),
            latency_ms = event.latency_ms(),
            error = %error,
            "{message}"
        );
    }

    fn log_requests(&self) -> Arc<dyn Middleware> {
        Arc::new(RequestLogging)
    }

    fn meter_request_duration(&self) -> Arc<dyn Middleware> {
        Arc::new(RequestDuration)
    }

    fn meter_requests_in_flight(&self) -> Arc<dyn Middleware> {
        Arc::new(RequestsInFlight)
    }
}
