//! Caller-facing error responses.
//!
//! # Responsibilities
//! - Define the per-request failure taxonomy
//! - Map each failure to a status code and a stable JSON body
//!
//! # Design Decisions
//! - Bodies are fixed strings; internal details stay in the logs
//! - Upstream timeouts result in 504, unreachable upstreams in 502
//! - CORS rejections carry no body and no CORS headers

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Terminal failure of a single request.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("origin not allowed")]
    CorsRejected,

    #[error("missing or invalid proxy key")]
    Unauthorized,

    #[error("rate limit exceeded")]
    RateLimited {
        /// Time until the client's window rolls over.
        retry_after: Duration,
    },

    #[error("unknown target slug")]
    UnknownSlug,

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("upstream timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::CorsRejected => StatusCode::FORBIDDEN,
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::UnknownSlug | GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message placed in the `error` field of the JSON body.
    pub fn public_message(&self) -> &'static str {
        match self {
            GatewayError::CorsRejected => "CORS blocked",
            GatewayError::Unauthorized => "Unauthorized",
            GatewayError::RateLimited { .. } => "Rate limit exceeded",
            GatewayError::UnknownSlug => "Unknown target slug",
            GatewayError::NotFound => "Not found",
            GatewayError::MethodNotAllowed => "Method not allowed",
            GatewayError::PayloadTooLarge { .. } => "Payload too large",
            GatewayError::UpstreamTimeout(_) => "Upstream timeout",
            GatewayError::UpstreamUnreachable(_) => "Upstream unreachable",
        }
    }

    /// Short label used for metrics and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::CorsRejected => "cors",
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::UnknownSlug => "unknown_slug",
            GatewayError::NotFound => "not_found",
            GatewayError::MethodNotAllowed => "method_not_allowed",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::UpstreamTimeout(_) => "upstream_timeout",
            GatewayError::UpstreamUnreachable(_) => "upstream_unreachable",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        // The browser blocks the response either way; keep it bare.
        if matches!(self, GatewayError::CorsRejected) {
            return status.into_response();
        }

        let mut response = (
            status,
            Json(ErrorBody {
                error: self.public_message(),
            }),
        )
            .into_response();

        if let GatewayError::RateLimited { retry_after } = self {
            // Rounded up so a client waiting exactly this long finds a fresh window.
            let secs = (retry_after.as_secs_f64().ceil() as u64).max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

/// `GET /health` body.
#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub ok: bool,
}
