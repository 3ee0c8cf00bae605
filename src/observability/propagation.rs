//! W3C Trace Context propagation.
//!
//! # Responsibilities
//! - Extract trace context from incoming `traceparent` / `tracestate` headers
//! - Derive child contexts for the proxy span
//! - Inject the active context into outbound request headers
//!
//! # Design Decisions
//! - Only the `traceparent` format is understood; unparsable headers are ignored
//!   and a new root trace is started instead
//! - `tracestate` is carried through opaquely

use axum::http::{HeaderMap, HeaderValue};

pub const TRACEPARENT: &str = "traceparent";
pub const TRACESTATE: &str = "tracestate";

/// The `sampled` trace flag.
pub const FLAG_SAMPLED: u8 = 0x01;

const VERSION: &str = "00";

/// Identifiers of one span within a distributed trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: u128,
    span_id: u64,
    flags: u8,
    trace_state: Option<String>,
}

impl TraceContext {
    /// Start a new trace.
    pub fn root() -> Self {
        Self {
            trace_id: non_zero(rand::random::<u128>),
            span_id: non_zero(rand::random::<u64>),
            flags: FLAG_SAMPLED,
            trace_state: None,
        }
    }

    /// A new span in the same trace.
    pub fn child(&self) -> Self {
        Self {
            trace_id: self.trace_id,
            span_id: non_zero(rand::random::<u64>),
            flags: self.flags,
            trace_state: self.trace_state.clone(),
        }
    }

    /// Read the context from request headers, if a valid one is present.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let traceparent = headers.get(TRACEPARENT)?.to_str().ok()?;
        let (trace_id, span_id, flags) = parse_traceparent(traceparent)?;

        let trace_state = headers
            .get(TRACESTATE)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Some(Self {
            trace_id,
            span_id,
            flags,
            trace_state,
        })
    }

    /// Write this context into `headers`, replacing any existing values.
    pub fn inject(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.traceparent()) {
            headers.insert(TRACEPARENT, value);
        }
        match self
            .trace_state
            .as_deref()
            .and_then(|s| HeaderValue::from_str(s).ok())
        {
            Some(value) => {
                headers.insert(TRACESTATE, value);
            }
            None => {
                headers.remove(TRACESTATE);
            }
        }
    }

    /// The `traceparent` header value.
    pub fn traceparent(&self) -> String {
        format!(
            "{VERSION}-{:032x}-{:016x}-{:02x}",
            self.trace_id, self.span_id, self.flags
        )
    }

    pub fn trace_id(&self) -> u128 {
        self.trace_id
    }

    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    pub fn trace_id_hex(&self) -> String {
        format!("{:032x}", self.trace_id)
    }

    pub fn span_id_hex(&self) -> String {
        format!("{:016x}", self.span_id)
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & FLAG_SAMPLED != 0
    }

    pub fn trace_state(&self) -> Option<&str> {
        self.trace_state.as_deref()
    }
}

fn non_zero<T: Default + PartialEq>(mut generate: impl FnMut() -> T) -> T {
    loop {
        let id = generate();
        if id != T::default() {
            return id;
        }
    }
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Parse `{version}-{trace-id}-{parent-id}-{flags}`.
fn parse_traceparent(value: &str) -> Option<(u128, u64, u8)> {
    let mut parts = value.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let span_id = parts.next()?;
    let flags = parts.next()?;

    if !is_lower_hex(version, 2) || version == "ff" {
        return None;
    }
    // Version 00 has exactly four fields; later versions may append more.
    if version == VERSION && parts.next().is_some() {
        return None;
    }
    if !is_lower_hex(trace_id, 32) || !is_lower_hex(span_id, 16) || !is_lower_hex(flags, 2) {
        return None;
    }

    let trace_id = u128::from_str_radix(trace_id, 16).ok()?;
    let span_id = u64::from_str_radix(span_id, 16).ok()?;
    let flags = u8::from_str_radix(flags, 16).ok()?;
    if trace_id == 0 || span_id == 0 {
        return None;
    }
    Some((trace_id, span_id, flags))
}
