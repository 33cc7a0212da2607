//! Access gate: origin policy and shared-secret check.
//!
//! Both checks must pass. The origin is evaluated first, by [`origin_gate`] in
//! front of every route, so that a browser sees a CORS failure rather than an
//! auth failure. Admitted origins are decorated and preflights answered by the
//! layer from [`AccessGate::cors_layer`].

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::AuthConfig;
use crate::http::response::GatewayError;
use crate::observability::metrics;

/// Header carrying the shared secret.
pub const PROXY_KEY_HEADER: &str = "x-proxy-key";

/// Methods advertised on preflight responses.
const CORS_METHODS: [Method; 6] = [
    Method::GET,
    Method::HEAD,
    Method::PUT,
    Method::PATCH,
    Method::POST,
    Method::DELETE,
];

/// Validates credentials and declared origins against the configured policy.
#[derive(Debug, Clone)]
pub struct AccessGate {
    proxy_key: String,
    allow_origins: Arc<HashSet<String>>,
}

/// An empty allow-list admits every origin.
fn admits(allow_origins: &HashSet<String>, origin: &HeaderValue) -> bool {
    allow_origins.is_empty()
        || origin
            .to_str()
            .is_ok_and(|value| allow_origins.contains(value))
}

impl AccessGate {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            proxy_key: config.proxy_key.clone(),
            allow_origins: Arc::new(config.allow_origins.iter().cloned().collect()),
        }
    }

    /// Absent origins always pass; present ones must match the allow-list
    /// exactly unless the list is empty.
    pub fn check_origin(&self, origin: Option<&HeaderValue>) -> Result<(), GatewayError> {
        match origin {
            Some(origin) if !admits(&self.allow_origins, origin) => Err(GatewayError::CorsRejected),
            _ => Ok(()),
        }
    }

    pub fn check_credential(&self, credential: Option<&HeaderValue>) -> Result<(), GatewayError> {
        match credential {
            Some(value) if value.as_bytes() == self.proxy_key.as_bytes() => Ok(()),
            _ => Err(GatewayError::Unauthorized),
        }
    }

    /// CORS decoration for admitted origins: reflects the origin, mirrors the
    /// requested headers and answers `OPTIONS` preflights.
    pub fn cors_layer(&self) -> CorsLayer {
        let allow_origins = Arc::clone(&self.allow_origins);
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin, _| {
                admits(&allow_origins, origin)
            }))
            .allow_methods(AllowMethods::list(CORS_METHODS))
            .allow_headers(AllowHeaders::mirror_request())
    }
}

/// Middleware refusing requests whose `Origin` is not on the allow-list.
pub async fn origin_gate(
    State(gate): State<Arc<AccessGate>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = request.headers().get(header::ORIGIN);
    if let Err(err) = gate.check_origin(origin) {
        tracing::warn!(
            origin = ?origin,
            path = %request.uri().path(),
            reason = err.reason(),
            "Request rejected"
        );
        metrics::record_rejection(err.reason());
        return err.into_response();
    }
    next.run(request).await
}
