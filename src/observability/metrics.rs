//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, in-flight)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency by method, route
//! - `gateway_requests_in_flight` (gauge): requests currently being served
//!
//! # Design Decisions
//! - Uses the `metrics` facade; without an installed recorder updates are no-ops
//! - Requests with no matched route are labelled `route="none"`

use std::net::SocketAddr;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::http::middleware::{Middleware, Next};
use crate::http::proxy::ProxyOutcome;

pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
pub const REQUEST_DURATION: &str = "gateway_request_duration_seconds";
pub const REQUESTS_IN_FLIGHT: &str = "gateway_requests_in_flight";

const NO_ROUTE_LABEL: &str = "none";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(REQUESTS_TOTAL, "Requests handled by the gateway");
    describe_histogram!(REQUEST_DURATION, Unit::Seconds, "Gateway request latency");
    describe_gauge!(REQUESTS_IN_FLIGHT, "Requests currently being served");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a completed request.
pub fn record_request(method: &str, status: StatusCode, route: Option<&str>, start: Instant) {
    let route = route.unwrap_or(NO_ROUTE_LABEL).to_string();
    counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.as_u16().to_string(),
        "route" => route.clone()
    )
    .increment(1);
    histogram!(
        REQUEST_DURATION,
        "method" => method.to_string(),
        "route" => route
    )
    .record(start.elapsed().as_secs_f64());
}

/// Records request count and duration.
#[derive(Debug, Default)]
pub struct RequestDuration;

#[async_trait]
impl Middleware for RequestDuration {
    async fn handle(&self, request: Request<Body>, next: Next<'_>) -> Response {
        let start = Instant::now();
        let method = request.method().to_string();

        let response = next.run(request).await;

        let route = response
            .extensions()
            .get::<ProxyOutcome>()
            .and_then(|o| o.prefix.as_deref());
        record_request(&method, response.status(), route, start);
        response
    }

    fn name(&self) -> &'static str {
        "request_duration"
    }
}

/// Keeps the in-flight gauge raised for as long as it lives.
///
/// The gauge drops even when the request future is cancelled.
#[derive(Debug)]
pub struct InFlightGuard(());

impl InFlightGuard {
    pub fn enter() -> Self {
        gauge!(REQUESTS_IN_FLIGHT).increment(1.0);
        Self(())
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

/// Tracks requests currently inside the chain.
#[derive(Debug, Default)]
pub struct RequestsInFlight;

#[async_trait]
impl Middleware for RequestsInFlight {
    async fn handle(&self, request: Request<Body>, next: Next<'_>) -> Response {
        let _guard = InFlightGuard::enter();
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "requests_in_flight"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::middleware::{Handler, MiddlewareChain};
    use axum::response::IntoResponse;
    use metrics::Key;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
    use std::sync::{Arc, Mutex};

    /// Answers 418 and remembers the in-flight gauge it saw.
    struct Teapot {
        snapshotter: Snapshotter,
        in_flight_seen: Mutex<Option<f64>>,
    }

    #[async_trait]
    impl Handler for Teapot {
        async fn call(&self, _request: Request<Body>) -> Response {
            *self.in_flight_seen.lock().unwrap() = in_flight(&self.snapshotter);
            StatusCode::IM_A_TEAPOT.into_response()
        }
    }

    fn in_flight(snapshotter: &Snapshotter) -> Option<f64> {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| match value {
                DebugValue::Gauge(v) if key.key().name() == REQUESTS_IN_FLIGHT => Some(v.0),
                _ => None,
            })
    }

    fn labels(key: &Key) -> Vec<(String, String)> {
        let mut labels: Vec<_> = key
            .labels()
            .map(|label| (label.key().to_string(), label.value().to_string()))
            .collect();
        labels.sort();
        labels
    }

    #[tokio::test]
    async fn metering_middleware_records_unrouted_request() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _local = metrics::set_default_local_recorder(&recorder);

        let teapot = Arc::new(Teapot {
            snapshotter: snapshotter.clone(),
            in_flight_seen: Mutex::new(None),
        });
        let chain = MiddlewareChain::new(teapot.clone())
            .with(Arc::new(RequestsInFlight))
            .with(Arc::new(RequestDuration));

        let request = Request::builder().uri("/x").body(Body::empty()).unwrap();
        let response = chain.call(request).await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(*teapot.in_flight_seen.lock().unwrap(), Some(1.0));

        let mut requests = Vec::new();
        let mut durations = Vec::new();
        let mut gauge = None;
        for (key, _, _, value) in snapshotter.snapshot().into_vec() {
            match (key.key().name(), value) {
                (REQUESTS_TOTAL, DebugValue::Counter(count)) => {
                    requests.push((count, labels(key.key())))
                }
                (REQUEST_DURATION, DebugValue::Histogram(samples)) => {
                    durations.push((samples.len(), labels(key.key())))
                }
                (REQUESTS_IN_FLIGHT, DebugValue::Gauge(value)) => gauge = Some(value.0),
                _ => {}
            }
        }

        let label = |k: &str, v: &str| (k.to_string(), v.to_string());
        assert_eq!(
            requests,
            vec![(
                1,
                vec![
                    label("method", "GET"),
                    label("route", "none"),
                    label("status", "418"),
                ]
            )]
        );
        assert_eq!(
            durations,
            vec![(1, vec![label("method", "GET"), label("route", "none")])]
        );
        assert_eq!(gauge, Some(0.0));
    }
}
