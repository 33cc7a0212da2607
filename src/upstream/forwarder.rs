//! Forwarding engine.
//!
//! # Responsibilities
//! - Send the rewritten request to the resolved upstream
//! - Enforce the connect and round-trip deadline
//! - Relay status, headers and body back unchanged (minus hop-by-hop headers)
//! - Classify failures as timeout or unreachable
//!
//! # Design Decisions
//! - One shared pooled client; TLS certificates always verified
//! - The outbound URI is built as an `http::Uri`, so the path reaches the upstream verbatim
//! - The client adds no headers of its own beyond `Host`
//! - Redirects are relayed to the caller, never followed
//! - Plain request/response only; upgrade requests are not tunnelled

use std::net::IpAddr;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request};
use axum::response::Response;
use hyper_tls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::TimeoutConfig;
use crate::http::response::GatewayError;
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::routing::UpstreamTarget;
use crate::security::headers::{outbound_headers, relay_headers};

type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Everything the forwarder needs about one inbound request.
#[derive(Debug)]
pub struct ForwardRequest<'a> {
    pub target: &'a UpstreamTarget,
    pub forward_path: &'a str,
    pub query: Option<&'a str>,
    pub method: Method,
    pub headers: &'a HeaderMap,
    pub body: Bytes,
    pub client_ip: IpAddr,
    pub request_id: &'a str,
}

/// Sends requests to upstreams with a fixed deadline.
#[derive(Clone)]
pub struct Forwarder {
    client: UpstreamClient,
    timeout: Duration,
}

impl Forwarder {
    /// Build the shared upstream client.
    pub fn new(config: &TimeoutConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpsConnector::new());
        Self {
            client,
            timeout: Duration::from_millis(config.upstream_ms),
        }
    }

    /// Forward a request and relay the upstream response.
    pub async fn forward(&self, request: ForwardRequest<'_>) -> Result<Response, GatewayError> {
        let uri = request
            .target
            .uri_for(request.forward_path, request.query)?;
        let slug = request.target.slug();
        let start = Instant::now();

        tracing::debug!(
            request_id = %request.request_id,
            slug = %slug,
            method = %request.method,
            upstream = %uri,
            "Forwarding request"
        );

        let mut outbound = Request::new(Body::from(request.body));
        *outbound.method_mut() = request.method;
        *outbound.uri_mut() = uri.clone();
        *outbound.headers_mut() =
            outbound_headers(request.headers, request.target, request.client_ip);

        let result = with_deadline(self.timeout, async {
            let upstream = self
                .client
                .request(outbound)
                .await
                .map_err(|e| GatewayError::UpstreamUnreachable(e.to_string()))?;
            let (parts, body) = upstream.into_parts();
            let body = axum::body::to_bytes(Body::new(body), usize::MAX)
                .await
                .map_err(|e| GatewayError::UpstreamUnreachable(e.to_string()))?;
            Ok((parts.status, relay_headers(&parts.headers), body))
        })
        .await;

        metrics::record_upstream_duration(slug, start);

        match result {
            Ok((status, headers, body)) => {
                tracing::debug!(
                    request_id = %request.request_id,
                    slug = %slug,
                    status = %status,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Upstream responded"
                );
                let mut response = Response::new(Body::from(body));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                Ok(response)
            }
            Err(err) => {
                tracing::error!(
                    request_id = %request.request_id,
                    slug = %slug,
                    upstream = %uri,
                    error = %err,
                    "Upstream error"
                );
                Err(err)
            }
        }
    }
}
