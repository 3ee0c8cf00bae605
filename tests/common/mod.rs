//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_gateway::config::{GatewayConfig, RouteConfig};
use api_gateway::http::middleware::Middleware;
use api_gateway::http::HttpServer;
use api_gateway::lifecycle::{build_route_table, Shutdown};
use api_gateway::observability::noop::Passthrough;
use api_gateway::observability::{
    Attribute, RequestEvent, Span, SpanStatus, Telemetry, TraceContext,
};
use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::routing::any;
use axum::{Json, Router};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve `router` on an ephemeral local port.
pub async fn start_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// A backend that answers every request with a JSON echo of it.
pub struct EchoBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl EchoBackend {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct EchoState {
    name: &'static str,
    hits: Arc<AtomicUsize>,
    delay: Duration,
}

/// Start an echo backend identifying itself as `name`.
pub async fn start_echo_backend(name: &'static str) -> EchoBackend {
    start_slow_echo_backend(name, Duration::ZERO).await
}

/// Start an echo backend that waits `delay` before answering.
pub async fn start_slow_echo_backend(name: &'static str, delay: Duration) -> EchoBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = EchoState {
        name,
        hits: hits.clone(),
        delay,
    };
    let router = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo))
        .with_state(state);

    let addr = start_backend(router).await;
    EchoBackend { addr, hits }
}

async fn echo(State(state): State<EchoState>, request: Request<Body>) -> Json<Value> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    let (parts, body) = request.into_parts();
    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in parts.headers.iter() {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(value.to_str().unwrap_or_default().to_string());
    }
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

    Json(json!({
        "backend": state.name,
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Config with the given `(prefix, backend_url)` routes.
pub fn gateway_config(routes: &[(&str, String)]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.timeouts.request_secs = 5;
    config.timeouts.connect_secs = 1;
    config.shutdown.grace_period_secs = 5;
    config.telemetry.metrics_enabled = false;
    config.routes = routes
        .iter()
        .map(|(prefix, backend_url)| RouteConfig {
            name: prefix.trim_matches('/').to_string(),
            prefix: prefix.to_string(),
            backend_url: backend_url.clone(),
        })
        .collect();
    config
}

/// A gateway running on an ephemeral port.
pub struct Gateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Build and start a gateway for `config` with `telemetry`.
pub async fn spawn_gateway(config: &GatewayConfig, telemetry: Arc<dyn Telemetry>) -> Gateway {
    let routes = build_route_table(&config.routes).unwrap();
    let server = HttpServer::from_config(config, routes, telemetry).unwrap();
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    Gateway {
        addr,
        shutdown,
        handle,
    }
}

/// Client that neither follows redirects nor uses a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

/// GET `uri` exactly as written and parse the JSON answer.
///
/// Unlike [`client`], nothing normalises dot segments or re-encodes the path.
pub async fn raw_get_json(uri: &str) -> Value {
    let client = Client::builder(TokioExecutor::new()).build_http::<Body>();
    let request = Request::get(uri).body(Body::empty()).unwrap();
    let response = client.request(request).await.unwrap();
    let body = axum::body::to_bytes(Body::new(response.into_body()), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// What a [`RecordingTelemetry`] has seen.
#[derive(Debug, Default)]
pub struct Recorded {
    pub spans_started: usize,
    pub spans_ended: usize,
    pub statuses: Vec<SpanStatus>,
    pub errors: Vec<String>,
    pub infos: Vec<String>,
    pub attributes: Vec<(String, String)>,
}

/// Telemetry that keeps everything in memory for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingTelemetry {
    pub fn snapshot<T>(&self, f: impl FnOnce(&Recorded) -> T) -> T {
        f(&self.recorded.lock().unwrap())
    }
}

struct RecordingSpan {
    recorded: Arc<Mutex<Recorded>>,
    context: TraceContext,
    status: SpanStatus,
}

impl Span for RecordingSpan {
    fn context(&self) -> Option<&TraceContext> {
        Some(&self.context)
    }

    fn set_attributes(&mut self, attributes: &[Attribute]) {
        let mut recorded = self.recorded.lock().unwrap();
        for attribute in attributes {
            recorded
                .attributes
                .push((attribute.key.to_string(), attribute.value.clone()));
        }
    }

    fn record_error(&mut self, _error: &(dyn std::error::Error + 'static)) {}

    fn set_status(&mut self, status: SpanStatus) {
        self.status = status;
    }

    fn end(self: Box<Self>) {
        let mut recorded = self.recorded.lock().unwrap();
        recorded.spans_ended += 1;
        recorded.statuses.push(self.status);
    }
}

impl Telemetry for RecordingTelemetry {
    fn service_name(&self) -> &str {
        "recording"
    }

    fn start_span(&self, _name: &'static str, parent: Option<TraceContext>) -> Box<dyn Span> {
        self.recorded.lock().unwrap().spans_started += 1;
        let context = parent.map_or_else(TraceContext::root, |p| p.child());
        Box::new(RecordingSpan {
            recorded: self.recorded.clone(),
            context,
            status: SpanStatus::Unset,
        })
    }

    fn log_info(&self, message: &str, _event: &RequestEvent<'_>) {
        self.recorded.lock().unwrap().infos.push(message.to_string());
    }

    fn log_error(
        &self,
        message: &str,
        _event: &RequestEvent<'_>,
        _error: &(dyn std::error::Error + 'static),
    ) {
        self.recorded.lock().unwrap().errors.push(message.to_string());
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
