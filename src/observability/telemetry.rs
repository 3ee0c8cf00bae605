//! Telemetry capability consumed by the proxy core.
//!
//! The proxy handler is constructed with an `Arc<dyn Telemetry>`; nothing in
//! the request path reaches for a process-wide handle. Two implementations
//! ship with the crate: [`NoopTelemetry`](super::NoopTelemetry) and
//! [`TracingTelemetry`](super::TracingTelemetry).

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode};

use super::propagation::TraceContext;
use crate::http::middleware::Middleware;

/// Span attribute keys.
pub mod keys {
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_TARGET: &str = "http.target";
    pub const HTTP_STATUS_CODE: &str = "http.status_code";
    pub const CLIENT_ADDR: &str = "http.client_ip";
    pub const ROUTE_PREFIX: &str = "gateway.prefix";
    pub const BACKEND: &str = "gateway.backend";
    pub const LATENCY_MS: &str = "gateway.latency_ms";
}

/// A key/value pair recorded on a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: &'static str,
    pub value: String,
}

impl Attribute {
    pub fn new(key: &'static str, value: impl ToString) -> Self {
        Self {
            key,
            value: value.to_string(),
        }
    }
}

/// Final status of a span.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error(String),
}

/// What the proxy knows about a request at the point an event is emitted.
#[derive(Debug, Clone)]
pub struct RequestEvent<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub prefix: Option<&'a str>,
    pub backend: Option<&'a str>,
    pub status: Option<StatusCode>,
    pub latency: Duration,
}

impl RequestEvent<'_> {
    pub fn latency_ms(&self) -> f64 {
        self.latency.as_secs_f64() * 1000.0
    }

    /// The event as span attributes; absent fields are skipped.
    pub fn attributes(&self) -> Vec<Attribute> {
        let mut attributes = vec![
            Attribute::new(keys::HTTP_METHOD, self.method),
            Attribute::new(keys::HTTP_TARGET, self.path),
            Attribute::new(keys::LATENCY_MS, format!("{:.3}", self.latency_ms())),
        ];
        if let Some(prefix) = self.prefix {
            attributes.push(Attribute::new(keys::ROUTE_PREFIX, prefix));
        }
        if let Some(backend) = self.backend {
            attributes.push(Attribute::new(keys::BACKEND, backend));
        }
        if let Some(status) = self.status {
            attributes.push(Attribute::new(keys::HTTP_STATUS_CODE, status.as_u16()));
        }
        attributes
    }
}

/// One traced operation.
pub trait Span: Send + Sync {
    /// Propagation context of this span, if it takes part in a trace.
    fn context(&self) -> Option<&TraceContext>;

    fn set_attributes(&mut self, attributes: &[Attribute]);

    fn record_error(&mut self, error: &(dyn std::error::Error + 'static));

    fn set_status(&mut self, status: SpanStatus);

    /// Run `f` with this span as the current one, so log events emitted
    /// inside it belong to the span.
    fn in_scope(&self, f: &mut dyn FnMut()) {
        f()
    }

    /// Finish the span.
    fn end(self: Box<Self>);
}

/// Tracing, logging and metering hooks used by the gateway.
pub trait Telemetry: Send + Sync {
    fn service_name(&self) -> &str;

    /// Start a span, as a child of `parent` when one was extracted.
    fn start_span(&self, name: &'static str, parent: Option<TraceContext>) -> Box<dyn Span>;

    /// Read an inbound trace context from request headers.
    fn extract(&self, headers: &HeaderMap) -> Option<TraceContext> {
        TraceContext::from_headers(headers)
    }

    /// Write the span's context into outbound headers.
    fn inject(&self, span: &dyn Span, headers: &mut HeaderMap) {
        if let Some(context) = span.context() {
            context.inject(headers);
        }
    }

    fn log_info(&self, message: &str, event: &RequestEvent<'_>);

    fn log_error(
        &self,
        message: &str,
        event: &RequestEvent<'_>,
        error: &(dyn std::error::Error + 'static),
    );

    /// Middleware logging one line per request.
    fn log_requests(&self) -> Arc<dyn Middleware>;

    /// Middleware recording request duration.
    fn meter_request_duration(&self) -> Arc<dyn Middleware>;

    /// Middleware tracking requests currently being served.
    fn meter_requests_in_flight(&self) -> Arc<dyn Middleware>;
}
