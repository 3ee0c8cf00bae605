//! Request handling and transformation.
//!
//! # Responsibilities
//! - Rewrite the inbound URI onto the matched backend
//! - Copy inbound headers and set the `X-Forwarded-*` headers
//! - Inject the proxy span's trace context
//! - Attach the inbound body to the outbound request without buffering
//!
//! # Design Decisions
//! - The matched prefix is stripped exactly once; the rest of the path and
//!   the query are forwarded byte for byte (no dot-segment removal, no
//!   re-encoding)
//! - `X-Forwarded-*` overwrite inbound values instead of appending
//! - `X-Forwarded-Proto` carries the backend's scheme
//! - The inbound `Host` header is not forwarded; the backend sees its own host
//! - Trace headers are injected last so the header copy cannot clobber them

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::header::{self, HeaderName};
use axum::http::request::Parts;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Uri};
use url::{Position, Url};

use crate::http::error::BuildError;
use crate::observability::{Span, Telemetry};
use crate::routing::Route;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Value of `X-Forwarded-For` when the peer address is not known.
const UNKNOWN_PEER: &str = "unknown";

/// A request ready to be sent to a backend.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Body,
}

impl OutboundRequest {
    /// Assemble the request handed to the outbound client. The body stays a
    /// stream.
    pub fn into_request(self) -> Request<Body> {
        let mut request = Request::new(self.body);
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.headers_mut() = self.headers;
        request
    }
}

/// Builds outbound requests from inbound ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestTransformer;

impl RequestTransformer {
    /// Build the outbound request for `request` on `route`.
    ///
    /// `remote_addr` is the caller's address; `span` is the proxy span whose
    /// context is injected through `telemetry`.
    pub fn build(
        &self,
        request: Request<Body>,
        route: &Route,
        remote_addr: Option<SocketAddr>,
        telemetry: &dyn Telemetry,
        span: &dyn Span,
    ) -> Result<OutboundRequest, BuildError> {
        let (parts, body) = request.into_parts();

        let uri = rewrite_uri(&parts.uri, route)?;
        let mut headers = forwarding_headers(&parts, route.backend(), remote_addr)?;
        telemetry.inject(span, &mut headers);

        Ok(OutboundRequest {
            method: parts.method,
            uri,
            headers,
            body,
        })
    }
}

/// Move `uri` onto the route's backend, stripping the matched prefix once.
///
/// Scheme and authority come from the backend URL; its path is ignored. The
/// remaining path and the raw query are copied without normalisation.
pub fn rewrite_uri(uri: &Uri, route: &Route) -> Result<Uri, BuildError> {
    let path_and_query = uri.path_and_query().ok_or(BuildError::MissingPath)?;
    let path = path_and_query.path();
    if !path.starts_with('/') {
        return Err(BuildError::MissingPath);
    }

    let remainder = route
        .strip_prefix(path)
        .ok_or_else(|| BuildError::PrefixMismatch {
            path: path.to_string(),
            prefix: route.prefix().to_string(),
        })?;

    let mut target = String::with_capacity(path_and_query.as_str().len() + 1);
    if !remainder.starts_with('/') {
        target.push('/');
    }
    target.push_str(remainder);
    if let Some(query) = path_and_query.query() {
        target.push('?');
        target.push_str(query);
    }

    let backend = route.backend();
    let mut parts = uri.clone().into_parts();
    parts.scheme = Some(backend.scheme().parse::<Scheme>().map_err(invalid_uri)?);
    parts.authority = Some(
        backend[Position::BeforeHost..Position::AfterPort]
            .parse::<Authority>()
            .map_err(invalid_uri)?,
    );
    parts.path_and_query = Some(target.parse::<PathAndQuery>().map_err(invalid_uri)?);
    Uri::from_parts(parts).map_err(invalid_uri)
}

fn invalid_uri(error: impl Into<axum::http::Error>) -> BuildError {
    BuildError::InvalidUri(error.into())
}

/// Inbound headers minus `Host`, plus the `X-Forwarded-*` set.
fn forwarding_headers(
    parts: &Parts,
    backend: &Url,
    remote_addr: Option<SocketAddr>,
) -> Result<HeaderMap, BuildError> {
    let mut headers = HeaderMap::with_capacity(parts.headers.len() + 3);
    for (name, value) in parts.headers.iter() {
        if name == header::HOST {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    let forwarded_for = match remote_addr {
        Some(addr) => header_value("X-Forwarded-For", &addr.to_string())?,
        None => HeaderValue::from_static(UNKNOWN_PEER),
    };
    let forwarded_host = match parts.headers.get(header::HOST) {
        Some(host) => host.clone(),
        None => match parts.uri.authority() {
            Some(authority) => header_value("X-Forwarded-Host", authority.as_str())?,
            None => HeaderValue::from_static(""),
        },
    };
    let forwarded_proto = header_value("X-Forwarded-Proto", backend.scheme())?;

    headers.insert(X_FORWARDED_FOR, forwarded_for);
    headers.insert(X_FORWARDED_HOST, forwarded_host);
    headers.insert(X_FORWARDED_PROTO, forwarded_proto);
    Ok(headers)
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, BuildError> {
    HeaderValue::from_str(value).map_err(|source| BuildError::InvalidHeader { name, source })
}
