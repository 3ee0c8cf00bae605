//! Response handling and transformation.
//!
//! # Responsibilities
//! - Copy backend status and headers onto the caller's response
//! - Stream the backend body to the caller
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Backend statuses (including 4xx/5xx) are relayed verbatim
//! - Repeated header names are appended, never collapsed
//! - The backend body is owned by the response body: it is dropped, and its
//!   connection released, on completion, copy error or caller disconnect

use std::fmt::Display;

use axum::body::{Body, Bytes, HttpBody};
use axum::response::Response;
use axum::BoxError;
use http_body_util::BodyExt;
use url::Url;

/// Relays backend responses to the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseRelay;

impl ResponseRelay {
    /// Turn the response `backend` sent into the caller's response.
    pub fn relay<B>(&self, upstream: axum::http::Response<B>, backend: &Url) -> Response
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError> + Display,
    {
        let (parts, body) = upstream.into_parts();
        let backend = backend.to_string();
        let body = body.map_err(move |e| {
            tracing::warn!(backend = %backend, error = %e, "Backend body stream failed mid-copy");
            e
        });

        let mut response = Response::new(Body::new(body));
        *response.status_mut() = parts.status;

        let out = response.headers_mut();
        for (name, value) in parts.headers.iter() {
            out.append(name.clone(), value.clone());
        }
        response
    }
}
