//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, security headers, origin gate, CORS)
//! - Dispatch `/t/<slug>/...` to the gateway pipeline
//! - Serve `/health` outside the credential and quota stages
//! - Bind server to listener and shut down gracefully

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::validation::validate_config;
use crate::config::{ConfigError, GatewayConfig};
use crate::http::pipeline::AppState;
use crate::http::request::request_span;
use crate::http::response::{GatewayError, HealthBody};
use crate::routing::{extract_slug, RouteTable};
use crate::security::access_control::origin_gate;
use crate::security::headers::security_headers_middleware;
use crate::security::{AccessGate, QuotaTracker};
use crate::upstream::Forwarder;

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// Rejects any configuration that fails `validate_config`.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let state = AppState {
            gate: Arc::new(AccessGate::new(&config.auth)),
            quota: Arc::new(QuotaTracker::new(&config.rate_limit)),
            routes: Arc::new(RouteTable::from_config(&config.routes)?),
            forwarder: Forwarder::new(&config.timeouts),
            security: config.security.clone(),
        };

        let router = build_router(state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = ?self.state.routes.slugs(),
            allow_origins = ?self.config.auth.allow_origins,
            "Proxy listening"
        );

        let sweeper = Arc::clone(&self.state.quota).spawn_sweeper(shutdown.resubscribe());

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let mut shutdown = shutdown;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        sweeper.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Router without connection info, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Build the Axum router with all middleware layers.
///
/// Outermost first: request ID, trace span, security headers, origin gate, CORS.
pub fn build_router(state: AppState) -> Router {
    let cors = state.gate.cors_layer();
    let gate = Arc::clone(&state.gate);

    Router::new()
        .route("/health", any(health_handler))
        .fallback(dispatch_handler)
        .with_state(state)
        .layer(cors)
        .layer(middleware::from_fn_with_state(gate, origin_gate))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// `GET /health`: no credential, no quota, no route table.
async fn health_handler(method: Method) -> Response {
    if method == Method::GET || method == Method::HEAD {
        Json(HealthBody { ok: true }).into_response()
    } else {
        GatewayError::NotFound.into_response()
    }
}

/// Everything except `/health`: the proxy namespace or 404.
async fn dispatch_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    if extract_slug(request.uri().path()).is_some() {
        state.proxy(peer, request).await
    } else {
        GatewayError::NotFound.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{header, StatusCode};
    use tower::ServiceExt;

    use crate::config::RouteConfig;

    fn config(origins: &[&str]) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth.proxy_key = "secret".to_string();
        config.auth.allow_origins = origins.iter().map(|s| s.to_string()).collect();
        config.routes = vec![RouteConfig::new("wetrust", "http://127.0.0.1:9")];
        config
    }

    fn app(origins: &[&str]) -> Router {
        HttpServer::new(config(origins))
            .unwrap()
            .router()
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))))
    }

    async fn call(app: Router, request: Request<Body>) -> Response {
        app.oneshot(request).await.unwrap()
    }

    fn get(uri: &str, origin: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_zero_window_config_rejected() {
        let mut config = config(&[]);
        config.rate_limit.window_secs = 0;
        assert!(matches!(
            HttpServer::new(config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_health_needs_no_credential() {
        let response = call(app(&[]), get("/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(body_string(response).await, r#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_health_respects_origin_policy() {
        let app = app(&["https://a.example"]);
        let response = call(app.clone(), get("/health", Some("https://b.example"))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));

        let response = call(app, get("/health", Some("https://a.example"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://a.example"
        );
    }

    #[tokio::test]
    async fn test_disallowed_origin_rejected_before_auth() {
        let request = Request::builder()
            .uri("/t/wetrust/x")
            .header(header::ORIGIN, "https://b.example")
            .header("x-proxy-key", "secret")
            .body(Body::empty())
            .unwrap();
        let response = call(app(&["https://a.example"]), request).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_preflight_answered_without_credential() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/t/wetrust/x")
            .header(header::ORIGIN, "https://a.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-proxy-key,content-type")
            .body(Body::empty())
            .unwrap();
        let response = call(app(&["https://a.example"]), request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://a.example");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "x-proxy-key,content-type"
        );
        let methods = headers[header::ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("POST") && methods.contains("DELETE"));
    }

    #[tokio::test]
    async fn test_rejection_carries_cors_header_for_admitted_origin() {
        let response = call(
            app(&["https://a.example"]),
            get("/t/wetrust/x", Some("https://a.example")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://a.example"
        );
        assert!(response.headers().contains_key(header::VARY));
    }

    #[tokio::test]
    async fn test_unknown_paths_are_not_found() {
        for uri in ["/", "/api", "/t", "/t/", "/health/deep"] {
            let response = call(app(&[]), get(uri, None)).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri {uri}");
            assert_eq!(body_string(response).await, r#"{"error":"Not found"}"#);
        }
    }

    #[tokio::test]
    async fn test_health_other_methods_not_found() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = call(app(&[]), request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_proxy_namespace_requires_key() {
        let response = call(app(&[]), get("/t/wetrust/foo", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
        assert_eq!(body_string(response).await, r#"{"error":"Unauthorized"}"#);
    }
}
