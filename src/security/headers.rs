//! Header manipulation and security headers.
//!
//! # Responsibilities
//! - Strip the proxy credential and hop-by-hop headers in both directions
//! - Rewrite `Host` to the upstream authority and add X-Forwarded-*
//! - Apply per-slug injected headers
//! - Add security response headers
//!
//! # Design Decisions
//! - The credential header never leaves the gateway, whatever the caller sent
//! - Injected headers replace caller-supplied values of the same name
//! - Security headers never override headers set by the upstream

use std::net::IpAddr;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

use crate::routing::UpstreamTarget;
use crate::security::access_control::PROXY_KEY_HEADER;

/// Hop-by-hop headers that must never be forwarded.
const HOP_BY_HOP_HEADERS: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const HOP_BY_HOP_CUSTOM: &[&str] = &["keep-alive", "proxy-connection"];

/// Response headers added to every response unless already present.
const SECURITY_HEADERS: &[(&str, &str)] = &[
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "none"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("cross-origin-opener-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
];

fn is_hop_by_hop(name: &HeaderName, connection_listed: &[String]) -> bool {
    HOP_BY_HOP_HEADERS.contains(name)
        || HOP_BY_HOP_CUSTOM.contains(&name.as_str())
        || connection_listed.iter().any(|listed| listed == name.as_str())
}

/// Header names nominated as hop-by-hop by the `Connection` header.
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Build the header set sent upstream.
pub fn outbound_headers(
    inbound: &HeaderMap,
    target: &UpstreamTarget,
    client_ip: IpAddr,
) -> HeaderMap {
    let listed = connection_tokens(inbound);
    let mut headers = HeaderMap::with_capacity(inbound.len() + 4);

    for (name, value) in inbound {
        if is_hop_by_hop(name, &listed)
            || *name == header::HOST
            || *name == header::CONTENT_LENGTH
            || name.as_str() == PROXY_KEY_HEADER
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    headers.insert(header::HOST, target.authority().clone());

    let forwarded_for = match inbound.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{prior}, {client_ip}"),
        None => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert("x-forwarded-for", value);
    }
    // The gateway's own view of host and scheme replaces whatever the caller sent.
    headers.remove("x-forwarded-host");
    if let Some(host) = inbound.get(header::HOST) {
        headers.insert("x-forwarded-host", host.clone());
    }
    headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));

    for (name, value) in target.inject_headers() {
        headers.insert(name.clone(), value.clone());
    }

    headers
}

/// Build the header set relayed back to the caller from an upstream response.
pub fn relay_headers(upstream: &HeaderMap) -> HeaderMap {
    let listed = connection_tokens(upstream);
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_hop_by_hop(name, &listed) || name.as_str() == PROXY_KEY_HEADER {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Insert the security headers that are not already present.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    for (name, value) in SECURITY_HEADERS {
        if !headers.contains_key(*name) {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
    }
}

/// Middleware adding security headers to every response.
pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeaderInjection, RouteConfig};
    use crate::routing::RouteTable;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    fn target(inject: bool) -> Arc<UpstreamTarget> {
        let mut route = RouteConfig::new("wetrust", "https://net-api.example.com");
        if inject {
            route.inject_headers.push(HeaderInjection {
                name: "authorization".into(),
                value_env: "KEY".into(),
                prefix: "Bearer ".into(),
            });
        }
        RouteTable::from_config_with_env(&[route], |_| Some("upstream-secret".into()))
            .unwrap()
            .resolve("wetrust")
            .unwrap()
    }

    fn inbound() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::HOST, HeaderValue::from_static("gateway.example"));
        h.insert("x-proxy-key", HeaderValue::from_static("secret"));
        h.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        h.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        h.insert("x-trace", HeaderValue::from_static("1"));
        h.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        h.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer caller"));
        h.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        h
    }

    #[test]
    fn test_outbound_strips_credential_and_rewrites_host() {
        let out = outbound_headers(&inbound(), &target(false), IpAddr::V4(Ipv4Addr::LOCALHOST));

        assert!(!out.contains_key("x-proxy-key"));
        assert!(!out.contains_key(header::CONNECTION));
        assert!(!out.contains_key("keep-alive"));
        assert!(!out.contains_key("x-trace"));
        assert!(!out.contains_key(header::CONTENT_LENGTH));
        assert_eq!(out[header::HOST], "net-api.example.com");
        assert_eq!(out[header::ACCEPT], "application/json");
        assert_eq!(out[header::AUTHORIZATION], "Bearer caller");
        assert_eq!(out["x-forwarded-for"], "127.0.0.1");
        assert_eq!(out["x-forwarded-host"], "gateway.example");
        assert_eq!(out["x-forwarded-proto"], "http");
    }

    #[test]
    fn test_caller_forwarding_claims_are_replaced() {
        let mut h = inbound();
        h.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        h.insert("x-forwarded-host", HeaderValue::from_static("spoofed.example"));
        let out = outbound_headers(&h, &target(false), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(out["x-forwarded-proto"], "http");
        assert_eq!(out["x-forwarded-host"], "gateway.example");
        assert_eq!(out.get_all("x-forwarded-proto").iter().count(), 1);

        h.remove(header::HOST);
        let out = outbound_headers(&h, &target(false), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(!out.contains_key("x-forwarded-host"));
    }

    #[test]
    fn test_forwarded_for_is_appended() {
        let mut h = inbound();
        h.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9"));
        let out = outbound_headers(&h, &target(false), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(out["x-forwarded-for"], "203.0.113.9, 10.0.0.1");
    }

    #[test]
    fn test_injected_header_replaces_caller_value() {
        let out = outbound_headers(&inbound(), &target(true), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(out[header::AUTHORIZATION], "Bearer upstream-secret");
        assert_eq!(out.get_all(header::AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn test_relay_drops_hop_by_hop_and_credential() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert("x-proxy-key", HeaderValue::from_static("echoed"));
        upstream.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        upstream.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));

        let out = relay_headers(&upstream);
        assert!(!out.contains_key(header::TRANSFER_ENCODING));
        assert!(!out.contains_key("x-proxy-key"));
        assert_eq!(out.get_all(header::SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_security_headers_do_not_override() {
        let mut h = HeaderMap::new();
        h.insert("x-frame-options", HeaderValue::from_static("DENY"));
        apply_security_headers(&mut h);
        assert_eq!(h["x-frame-options"], "DENY");
        assert_eq!(h["x-content-type-options"], "nosniff");
        assert!(!h.contains_key("cross-origin-resource-policy"));
    }
}
