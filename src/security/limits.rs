//! Request body limits.
//!
//! # Responsibilities
//! - Enforce maximum request body size before forwarding
//!
//! # Design Decisions
//! - Declared Content-Length checked before reading (early rejection)
//! - Chunked bodies are cut off at the limit while reading
//! - Return 413 Payload Too Large

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap};

use crate::http::response::GatewayError;

/// Buffer a request body, rejecting anything over `limit` bytes.
pub async fn read_body_limited(
    headers: &HeaderMap,
    body: Body,
    limit: usize,
) -> Result<Bytes, GatewayError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    if declared.is_some_and(|len| len > limit as u64) {
        return Err(GatewayError::PayloadTooLarge { limit });
    }

    axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, limit, "Request body rejected");
        GatewayError::PayloadTooLarge { limit }
    })
}
