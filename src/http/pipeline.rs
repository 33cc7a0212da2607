//! Gateway pipeline.
//!
//! Every proxied request walks the same fixed sequence of stages. The origin
//! check runs in front of the router (`security::access_control::origin_gate`),
//! so a request reaching the pipeline has already passed it:
//!
//! ```text
//! CorsChecked → Authorized → QuotaChecked → Routed → Rewritten → Forwarded → Responded
//!     \______________\____________\____________\___________\__________→ Rejected(reason)
//! ```
//!
//! The first failing stage ends the request with its error response. Nothing
//! is retried.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::{IntoResponse, Response};

use crate::config::SecurityConfig;
use crate::http::request::request_id_of;
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::routing::{extract_slug, rewrite, RouteTable};
use crate::security::limits::read_body_limited;
use crate::security::{AccessGate, ClientIdentity, QuotaDecision, QuotaTracker, PROXY_KEY_HEADER};
use crate::upstream::{ForwardRequest, Forwarder};

/// Position of a request in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CorsChecked,
    Authorized,
    QuotaChecked,
    Routed,
    Rewritten,
    Forwarded,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CorsChecked => "cors_checked",
            Stage::Authorized => "authorized",
            Stage::QuotaChecked => "quota_checked",
            Stage::Routed => "routed",
            Stage::Rewritten => "rewritten",
            Stage::Forwarded => "forwarded",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Terminal rejection: the stage reached before failing, and why.
#[derive(Debug)]
pub struct Rejection {
    pub stage: Stage,
    pub error: GatewayError,
}

/// Methods accepted on the proxy namespace. `OPTIONS` is answered by the CORS layer.
const PROXIED_METHODS: &[Method] = &[
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
];

/// Shared, read-only pipeline components.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AccessGate>,
    pub quota: Arc<QuotaTracker>,
    pub routes: Arc<RouteTable>,
    pub forwarder: Forwarder,
    pub security: SecurityConfig,
}

/// Tracks the stage a request has reached.
struct Progress {
    stage: Stage,
}

impl Progress {
    fn advance(&mut self, stage: Stage) {
        self.stage = stage;
    }

    fn reject(&self, error: GatewayError) -> Rejection {
        Rejection {
            stage: self.stage,
            error,
        }
    }
}

impl AppState {
    /// Run a `/t/<slug>/...` request through the full pipeline.
    pub async fn proxy(&self, peer: SocketAddr, request: Request<Body>) -> Response {
        let request_id = request_id_of(request.headers());
        let path = request.uri().path().to_string();

        match self.run(peer, &request_id, request).await {
            Ok(response) => response,
            Err(rejection) => {
                tracing::warn!(
                    request_id = %request_id,
                    path = %path,
                    stage = %rejection.stage,
                    reason = rejection.error.reason(),
                    "Request rejected"
                );
                metrics::record_rejection(rejection.error.reason());
                rejection.error.into_response()
            }
        }
    }

    async fn run(
        &self,
        peer: SocketAddr,
        request_id: &str,
        request: Request<Body>,
    ) -> Result<Response, Rejection> {
        let mut progress = Progress {
            stage: Stage::CorsChecked,
        };
        let (parts, body) = request.into_parts();

        // Auth
        self.gate
            .check_credential(parts.headers.get(PROXY_KEY_HEADER))
            .map_err(|e| progress.reject(e))?;
        if !PROXIED_METHODS.contains(&parts.method) {
            return Err(progress.reject(GatewayError::MethodNotAllowed));
        }
        progress.advance(Stage::Authorized);

        // Quota
        let identity =
            ClientIdentity::from_request(peer, &parts.headers, self.security.trust_proxy);
        match self.quota.consume(identity) {
            QuotaDecision::Admitted { remaining } => {
                tracing::trace!(client = %identity, remaining, "Quota consumed");
            }
            QuotaDecision::Denied { retry_after } => {
                tracing::debug!(client = %identity, ?retry_after, "Quota exhausted");
                return Err(progress.reject(GatewayError::RateLimited { retry_after }));
            }
        }
        progress.advance(Stage::QuotaChecked);

        // Route lookup
        let path = parts.uri.path();
        let slug = extract_slug(path).ok_or_else(|| progress.reject(GatewayError::NotFound))?;
        let target = self.routes.resolve(slug).map_err(|e| progress.reject(e))?;
        progress.advance(Stage::Routed);

        // Path rewrite
        let forward_path = rewrite(path, slug);
        progress.advance(Stage::Rewritten);

        // Forward
        let body = read_body_limited(&parts.headers, body, self.security.max_body_size)
            .await
            .map_err(|e| progress.reject(e))?;
        let response = self
            .forwarder
            .forward(ForwardRequest {
                target: &target,
                forward_path: &forward_path,
                query: parts.uri.query(),
                method: parts.method.clone(),
                headers: &parts.headers,
                body,
                client_ip: identity.ip(),
                request_id,
            })
            .await
            .map_err(|e| progress.reject(e))?;
        progress.advance(Stage::Forwarded);

        metrics::record_request(target.slug(), response.status().as_u16());
        tracing::debug!(
            request_id = %request_id,
            client = %identity,
            slug = %target.slug(),
            status = %response.status(),
            "Request relayed"
        );
        progress.advance(Stage::Responded);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthConfig, RateLimitConfig, RouteConfig, TimeoutConfig};

    fn state(points: u32) -> AppState {
        let routes = RouteTable::from_config_with_env(
            // Nothing listens on port 9; forwarding would fail fast.
            &[RouteConfig::new("wetrust", "http://127.0.0.1:9")],
            |_| None,
        )
        .unwrap();
        AppState {
            gate: Arc::new(AccessGate::new(&AuthConfig {
                proxy_key: "secret".into(),
                allow_origins: Vec::new(),
            })),
            quota: Arc::new(QuotaTracker::new(&RateLimitConfig {
                points,
                window_secs: 60,
            })),
            routes: Arc::new(routes),
            forwarder: Forwarder::new(&TimeoutConfig { upstream_ms: 1_000 }),
            security: SecurityConfig::default(),
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn request(method: Method, uri: &str, headers: &[(&'static str, &'static str)]) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn rejection_of(state: &AppState, req: Request<Body>) -> Rejection {
        match state.run(peer(), "test", req).await {
            Ok(response) => panic!("expected rejection, got {}", response.status()),
            Err(rejection) => rejection,
        }
    }

    #[tokio::test]
    async fn test_auth_fails_at_cors_checked() {
        let state = state(60);
        let rejection = rejection_of(&state, request(Method::GET, "/t/wetrust/x", &[])).await;
        assert_eq!(rejection.stage, Stage::CorsChecked);
        assert!(matches!(rejection.error, GatewayError::Unauthorized));
    }

    #[tokio::test]
    async fn test_unknown_slug_after_quota() {
        let state = state(60);
        let req = request(Method::GET, "/t/nope/x", &[("x-proxy-key", "secret")]);
        let rejection = rejection_of(&state, req).await;
        assert_eq!(rejection.stage, Stage::QuotaChecked);
        assert!(matches!(rejection.error, GatewayError::UnknownSlug));
        // The lookup consumed quota.
        assert_eq!(state.quota.tracked_clients(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_does_not_consume_quota() {
        let state = state(1);
        for _ in 0..3 {
            let req = request(Method::GET, "/t/nope", &[("x-proxy-key", "wrong")]);
            let rejection = rejection_of(&state, req).await;
            assert!(matches!(rejection.error, GatewayError::Unauthorized));
        }
        assert_eq!(state.quota.tracked_clients(), 0);
    }

    #[tokio::test]
    async fn test_quota_rejects_before_route_lookup() {
        let state = state(1);
        let first = request(Method::GET, "/t/nope", &[("x-proxy-key", "secret")]);
        let _ = state.run(peer(), "test", first).await;
        let second = request(Method::GET, "/t/nope", &[("x-proxy-key", "secret")]);
        let rejection = rejection_of(&state, second).await;
        assert_eq!(rejection.stage, Stage::Authorized);
        assert!(matches!(rejection.error, GatewayError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_upstream_failure_after_rewrite() {
        let state = state(60);
        let req = request(Method::GET, "/t/wetrust/foo", &[("x-proxy-key", "secret")]);
        let rejection = rejection_of(&state, req).await;
        assert_eq!(rejection.stage, Stage::Rewritten);
        assert!(matches!(rejection.error, GatewayError::UpstreamUnreachable(_)));
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let state = state(60);
        let req = request(Method::TRACE, "/t/wetrust", &[("x-proxy-key", "secret")]);
        let rejection = rejection_of(&state, req).await;
        assert!(matches!(rejection.error, GatewayError::MethodNotAllowed));
    }

    #[tokio::test]
    async fn test_rejection_maps_to_status() {
        let state = state(60);
        let response = state.proxy(peer(), request(Method::GET, "/t/wetrust", &[])).await;
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
