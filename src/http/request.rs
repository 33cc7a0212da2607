//! Request correlation.
//!
//! # Responsibilities
//! - Name the request ID header set by the request-id layer
//! - Read the request ID back for log events and the per-request span
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (outermost layer)
//! - A caller-supplied ID is kept and forwarded upstream unchanged

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use tracing::Span;

/// Request header carrying the correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Correlation id set by the request-id layer, or "unknown".
pub fn request_id_of(headers: &HeaderMap) -> String {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Span wrapping one request, used by the trace layer.
pub fn request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        version = ?request.version(),
        request_id = %request_id_of(request.headers()),
    )
}
