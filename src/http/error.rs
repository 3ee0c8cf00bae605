//! Gateway failure taxonomy.
//!
//! Every failure the gateway itself produces maps to one internal signal and
//! one caller-visible status. Backend error statuses are not failures here;
//! they are relayed verbatim.
//!
//! | Signal                | Status | Body                           |
//! |-----------------------|--------|--------------------------------|
//! | `NO_ROUTE`            | 404    | `Service not found`            |
//! | `BUILD_FAILED`        | 500    | `Error creating proxy request` |
//! | `BACKEND_UNREACHABLE` | 502    | `Backend error`                |

use std::time::Duration;

use axum::http::header::InvalidHeaderValue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::proxy::OutcomeKind;

/// Why an outbound request could not be constructed.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The inbound URI carries no usable path (authority-form or `*`).
    #[error("request URI has no usable path")]
    MissingPath,
    /// The path does not start with the matched prefix.
    #[error("path {path:?} does not start with route prefix {prefix:?}")]
    PrefixMismatch { path: String, prefix: String },
    #[error("invalid value for outbound header {name}: {source}")]
    InvalidHeader {
        name: &'static str,
        #[source]
        source: InvalidHeaderValue,
    },
    /// The backend scheme, authority or rewritten path is not a valid URI part.
    #[error("invalid outbound URI: {0}")]
    InvalidUri(#[source] axum::http::Error),
}

/// Why a built request got no response head from its backend.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Client(#[from] hyper_util::client::legacy::Error),
}

/// Internal signal names, used in logs and span status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    NoRoute,
    BuildFailed,
    BackendUnreachable,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::NoRoute => "NO_ROUTE",
            Signal::BuildFailed => "BUILD_FAILED",
            Signal::BackendUnreachable => "BACKEND_UNREACHABLE",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request the gateway could not complete.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route matches path {path:?}")]
    NoRoute { path: String },

    #[error("failed to build proxy request: {0}")]
    BuildFailed(#[from] BuildError),

    #[error("backend {backend} unreachable: {source}")]
    BackendUnreachable {
        backend: String,
        #[source]
        source: ForwardError,
    },
}

impl GatewayError {
    pub fn signal(&self) -> Signal {
        match self {
            GatewayError::NoRoute { .. } => Signal::NoRoute,
            GatewayError::BuildFailed(_) => Signal::BuildFailed,
            GatewayError::BackendUnreachable { .. } => Signal::BackendUnreachable,
        }
    }

    /// Status written to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NoRoute { .. } => StatusCode::NOT_FOUND,
            GatewayError::BuildFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::BackendUnreachable { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Plain-text body written to the caller. Internal details stay in logs.
    pub fn client_message(&self) -> &'static str {
        match self {
            GatewayError::NoRoute { .. } => "Service not found",
            GatewayError::BuildFailed(_) => "Error creating proxy request",
            GatewayError::BackendUnreachable { .. } => "Backend error",
        }
    }

    pub fn outcome_kind(&self) -> OutcomeKind {
        match self {
            GatewayError::NoRoute { .. } => OutcomeKind::Unmatched,
            GatewayError::BuildFailed(_) => OutcomeKind::BuildError,
            GatewayError::BackendUnreachable { .. } => OutcomeKind::MatchedBackendError,
        }
    }

    /// True when the backend call was abandoned because the request timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            GatewayError::BackendUnreachable {
                source: ForwardError::Timeout(_),
                ..
            }
        )
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), self.client_message()).into_response()
    }
}
