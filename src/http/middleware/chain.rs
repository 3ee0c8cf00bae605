//! Ordered middleware composition around a terminal handler.
//!
//! The first middleware in the list is the outermost: it sees the request
//! first and the response last. [`Next`] is consumed by value, so a
//! middleware can hand the request on at most once; returning without
//! calling it short-circuits the chain with its own response.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::observability::Telemetry;

/// The terminal handler at the centre of a chain.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: Request<Body>) -> Response;
}

/// A request-wrapping step.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Process the request, usually by calling `next.run(request)` once.
    async fn handle(&self, request: Request<Body>, next: Next<'_>) -> Response;

    /// Name used in startup logs.
    fn name(&self) -> &'static str;
}

/// The remainder of the chain after the current middleware.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    handler: &'a dyn Handler,
}

impl Next<'_> {
    /// Run the rest of the chain.
    pub async fn run(self, request: Request<Body>) -> Response {
        match self.middlewares.split_first() {
            Some((current, rest)) => {
                let next = Next {
                    middlewares: rest,
                    handler: self.handler,
                };
                current.handle(request, next).await
            }
            None => self.handler.call(request).await,
        }
    }
}

/// A handler wrapped by an ordered list of middlewares.
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
    handler: Arc<dyn Handler>,
}

impl MiddlewareChain {
    /// Create a chain with no middleware around `handler`.
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            middlewares: Vec::new(),
            handler,
        }
    }

    /// Append a middleware. It runs inside every middleware added before it.
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Append several middlewares, keeping their order.
    pub fn with_all(mut self, middlewares: impl IntoIterator<Item = Arc<dyn Middleware>>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    /// Middleware names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|m| m.name()).collect()
    }

    /// Run a request through the chain.
    pub async fn call(&self, request: Request<Body>) -> Response {
        Next {
            middlewares: &self.middlewares,
            handler: self.handler.as_ref(),
        }
        .run(request)
        .await
    }
}

#[async_trait]
impl Handler for MiddlewareChain {
    async fn call(&self, request: Request<Body>) -> Response {
        MiddlewareChain::call(self, request).await
    }
}

/// The standard telemetry wrappers: request log outermost, then the
/// in-flight gauge, then the duration histogram.
pub fn telemetry_middlewares(telemetry: &dyn Telemetry) -> Vec<Arc<dyn Middleware>> {
    vec![
        telemetry.log_requests(),
        telemetry.meter_requests_in_flight(),
        telemetry.meter_request_duration(),
    ]
}
