//! Proxy handler: match, build, forward, relay.
//!
//! # Responsibilities
//! - Look up the route for each request
//! - Build the outbound request and send it through the shared client
//! - Relay the backend response, or map the failure to a gateway error
//! - Emit a telemetry event and span data at every exit
//!
//! # Design Decisions
//! - One backend attempt per request, no retries
//! - A backend reply of any status is a success at this layer
//! - The outcome is attached to the response so outer middleware can read it
//! - Dropping the request future (caller gone) drops the outbound call with it
//! - The request timeout bounds the wait for the response head; the body is
//!   streamed afterwards without a deadline

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::config::TimeoutConfig;
use crate::http::error::{ForwardError, GatewayError};
use crate::http::middleware::Handler;
use crate::http::request::RequestTransformer;
use crate::http::response::ResponseRelay;
use crate::observability::telemetry::keys;
use crate::observability::{Attribute, RequestEvent, Span, SpanStatus, Telemetry};
use crate::routing::{Route, RouteTable};

/// Name of the span covering one proxied request.
pub const PROXY_SPAN: &str = "api_gateway.proxy";

/// How a request left the proxy handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// A backend replied; its response was relayed.
    MatchedSuccess,
    /// A route matched but the backend could not be reached.
    MatchedBackendError,
    /// No route matched.
    Unmatched,
    /// The outbound request could not be built.
    BuildError,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::MatchedSuccess => "matched-success",
            OutcomeKind::MatchedBackendError => "matched-backend-error",
            OutcomeKind::Unmatched => "unmatched",
            OutcomeKind::BuildError => "build-error",
        }
    }
}

/// Result of one request, stored in the response extensions.
///
/// For a relayed response, `latency` runs until the backend's response head
/// arrived, and the proxy span has already ended when the caller's body
/// starts streaming. Body transfer time is not part of either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyOutcome {
    pub kind: OutcomeKind,
    pub status: StatusCode,
    pub latency: Duration,
    pub prefix: Option<String>,
}

/// Settings of the shared outbound client.
#[derive(Debug, Clone, Copy)]
pub struct ClientSettings {
    /// Upper bound on the wait for a backend's response head.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

impl From<&TimeoutConfig> for ClientSettings {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_secs),
            connect_timeout: Duration::from_secs(config.connect_secs),
        }
    }
}

/// Outbound client: pooled, http or https, HTTP/1.1.
pub type BackendClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build the shared outbound client. Redirects are never followed.
///
/// TLS uses the `ring` provider explicitly, so no process-wide default
/// provider has to be installed.
pub fn backend_client(settings: &ClientSettings) -> Result<BackendClient, rustls::Error> {
    let mut http = HttpConnector::new();
    http.set_connect_timeout(Some(settings.connect_timeout));
    http.enforce_http(false);

    let https = HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Ok(Client::builder(TokioExecutor::new()).build(https))
}

/// Forwards requests to the backend registered for their path.
pub struct ProxyHandler {
    routes: RouteTable,
    client: BackendClient,
    request_timeout: Duration,
    telemetry: Arc<dyn Telemetry>,
    transformer: RequestTransformer,
    relay: ResponseRelay,
}

impl ProxyHandler {
    /// Create a handler owning `routes`. The table cannot change afterwards.
    pub fn new(
        routes: RouteTable,
        telemetry: Arc<dyn Telemetry>,
        settings: ClientSettings,
    ) -> Result<Self, rustls::Error> {
        Ok(Self {
            routes,
            client: backend_client(&settings)?,
            request_timeout: settings.request_timeout,
            telemetry,
            transformer: RequestTransformer,
            relay: ResponseRelay,
        })
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Proxy one request.
    pub async fn proxy(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let parent = self.telemetry.extract(request.headers());
        let mut span = self.telemetry.start_span(PROXY_SPAN, parent);
        span.set_attributes(&[
            Attribute::new(keys::HTTP_METHOD, &method),
            Attribute::new(keys::HTTP_TARGET, &path),
        ]);
        if let Some(addr) = remote_addr {
            span.set_attributes(&[Attribute::new(keys::CLIENT_ADDR, addr)]);
        }

        tracing::debug!(method = %method, path = %path, "Proxying request");

        // MATCH
        let Some(route) = self.routes.match_path(&path) else {
            let error = GatewayError::NoRoute { path: path.clone() };
            return self.fail(error, &method, &path, None, span, start);
        };
        span.set_attributes(&[
            Attribute::new(keys::ROUTE_PREFIX, route.prefix()),
            Attribute::new(keys::BACKEND, route.backend()),
        ]);

        // BUILD
        let outbound = match self.transformer.build(
            request,
            route,
            remote_addr,
            self.telemetry.as_ref(),
            span.as_ref(),
        ) {
            Ok(outbound) => outbound,
            Err(e) => return self.fail(e.into(), &method, &path, Some(route), span, start),
        };

        // FORWARD
        let upstream = match self.forward(outbound.into_request()).await {
            Ok(upstream) => upstream,
            Err(source) => {
                let error = GatewayError::BackendUnreachable {
                    backend: route.backend().to_string(),
                    source,
                };
                return self.fail(error, &method, &path, Some(route), span, start);
            }
        };

        // RELAY
        let status = upstream.status();
        let mut response = self.relay.relay(upstream, route.backend());

        // Measured at the response head; the body streams after the span ends.
        let latency = start.elapsed();
        let event = RequestEvent {
            method: &method,
            path: &path,
            prefix: Some(route.prefix()),
            backend: Some(route.backend().as_str()),
            status: Some(status),
            latency,
        };
        span.set_attributes(&event.attributes());
        span.set_status(SpanStatus::Ok);
        span.in_scope(&mut || self.telemetry.log_info("Proxy request", &event));
        span.end();

        response.extensions_mut().insert(ProxyOutcome {
            kind: OutcomeKind::MatchedSuccess,
            status,
            latency,
            prefix: Some(route.prefix().to_string()),
        });
        response
    }

    /// Send `request`, waiting at most the request timeout for the head.
    async fn forward(
        &self,
        request: Request<Body>,
    ) -> Result<axum::http::Response<hyper::body::Incoming>, ForwardError> {
        match tokio::time::timeout(self.request_timeout, self.client.request(request)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ForwardError::Timeout(self.request_timeout)),
        }
    }

    /// Record `error` on the span and in the log, then answer the caller.
    fn fail(
        &self,
        error: GatewayError,
        method: &Method,
        path: &str,
        route: Option<&Route>,
        mut span: Box<dyn Span>,
        start: Instant,
    ) -> Response {
        let status = error.status();
        let latency = start.elapsed();
        let event = RequestEvent {
            method,
            path,
            prefix: route.map(Route::prefix),
            backend: route.map(|r| r.backend().as_str()),
            status: Some(status),
            latency,
        };

        span.set_attributes(&event.attributes());
        span.record_error(&error);
        span.set_status(SpanStatus::Error(error.signal().to_string()));
        span.in_scope(&mut || {
            self.telemetry
                .log_error(error.signal().as_str(), &event, &error);
            if error.is_timeout() {
                tracing::debug!(path = %path, "Backend call timed out");
            }
        });
        span.end();

        let outcome = ProxyOutcome {
            kind: error.outcome_kind(),
            status,
            latency,
            prefix: route.map(|r| r.prefix().to_string()),
        };
        let mut response = error.into_response();
        response.extensions_mut().insert(outcome);
        response
    }
}

#[async_trait]
impl Handler for ProxyHandler {
    async fn call(&self, request: Request<Body>) -> Response {
        self.proxy(request).await
    }
}
