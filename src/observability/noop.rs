//! Telemetry that does nothing.
//!
//! Used when telemetry is disabled and to test the proxy core in isolation.
//! It starts no trace and injects no headers, so an inbound `traceparent`
//! reaches the backend only through the ordinary header copy.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request};
use axum::response::Response;

use super::propagation::TraceContext;
use super::telemetry::{Attribute, RequestEvent, Span, SpanStatus, Telemetry};
use crate::http::middleware::{Middleware, Next};

/// No-op telemetry.
#[derive(Debug, Clone, Default)]
pub struct NoopTelemetry {
    service_name: String,
}

impl NoopTelemetry {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

/// A span that records nothing.
#[derive(Debug, Default)]
pub struct NoopSpan;

impl Span for NoopSpan {
    fn context(&self) -> Option<&TraceContext> {
        None
    }

    fn set_attributes(&mut self, _attributes: &[Attribute]) {}

    fn record_error(&mut self, _error: &(dyn std::error::Error + 'static)) {}

    fn set_status(&mut self, _status: SpanStatus) {}

    fn end(self: Box<Self>) {}
}

/// Middleware that hands the request straight on.
#[derive(Debug, Default)]
pub struct Passthrough;

#[async_trait]
impl Middleware for Passthrough {
    async fn handle(&self, request: Request<Body>, next: Next<'_>) -> Response {
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}

impl Telemetry for NoopTelemetry {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn start_span(&self, _name: &'static str, _parent: Option<TraceContext>) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }

    fn extract(&self, _headers: &HeaderMap) -> Option<TraceContext> {
        None
    }

    fn inject(&self, _span: &dyn Span, _headers: &mut HeaderMap) {}

    fn log_info(&self, _message: &str, _event: &RequestEvent<'_>) {}

    fn log_error(
        &self,
        _message: &str,
        _event: &RequestEvent<'_>,
        _error: &(dyn std::error::Error + 'static),
    ) {
    }

    fn log_requests(&self) -> Arc<dyn Middleware> {
        Arc::new(Passthrough)
    }

    fn meter_request_duration(&self) -> Arc<dyn Middleware> {
        Arc::new(Passthrough)
    }

    fn meter_requests_in_flight(&self) -> Arc<dyn Middleware> {
        Arc::new(Passthrough)
    }
}
