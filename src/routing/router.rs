//! Slug lookup.
//!
//! # Responsibilities
//! - Store the startup-configured slug → upstream mapping
//! - Resolve a slug by exact match or report `UnknownSlug`
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) lookup via HashMap; no wildcard or prefix matching

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use url::Url;

use crate::config::{ConfigError, RouteConfig};
use crate::config::validation::ValidationError;
use crate::http::response::GatewayError;

/// A resolved upstream for one slug.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    slug: String,
    base: Url,
    authority: HeaderValue,
    inject_headers: HeaderMap,
}

impl UpstreamTarget {
    /// Slug this target is registered under.
    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// `host[:port]` used as the outbound `Host` header.
    pub fn authority(&self) -> &HeaderValue {
        &self.authority
    }

    /// Headers set on every request forwarded to this upstream.
    pub fn inject_headers(&self) -> &HeaderMap {
        &self.inject_headers
    }

    /// Full outbound URI for a rewritten path and optional raw query.
    ///
    /// The path is appended byte for byte; dot segments and percent-escapes
    /// are not interpreted.
    pub fn uri_for(&self, forward_path: &str, query: Option<&str>) -> Result<Uri, GatewayError> {
        let base = self.base.as_str().trim_end_matches('/');
        let raw = match query {
            Some(q) => format!("{base}{forward_path}?{q}"),
            None => format!("{base}{forward_path}"),
        };
        Uri::try_from(raw)
            .map_err(|e| GatewayError::UpstreamUnreachable(format!("invalid upstream uri: {e}")))
    }
}

/// Immutable slug → upstream mapping.
#[derive(Debug, Default)]
pub struct RouteTable {
    targets: HashMap<String, Arc<UpstreamTarget>>,
}

impl RouteTable {
    /// Build from configuration, reading injected header values from the process environment.
    pub fn from_config(routes: &[RouteConfig]) -> Result<Self, ConfigError> {
        Self::from_config_with_env(routes, |name| std::env::var(name).ok())
    }

    /// Build from configuration with an explicit lookup for injected header values.
    pub fn from_config_with_env<F>(routes: &[RouteConfig], lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut targets = HashMap::with_capacity(routes.len());

        for route in routes {
            let target = build_target(route, &lookup)
                .map_err(|e| ConfigError::Validation(vec![e]))?;
            if targets.insert(route.slug.clone(), Arc::new(target)).is_some() {
                return Err(ConfigError::Validation(vec![ValidationError::DuplicateSlug(
                    route.slug.clone(),
                )]));
            }
        }

        Ok(Self { targets })
    }

    /// Exact-match lookup.
    pub fn resolve(&self, slug: &str) -> Result<Arc<UpstreamTarget>, GatewayError> {
        self.targets
            .get(slug)
            .cloned()
            .ok_or(GatewayError::UnknownSlug)
    }

    /// Registered slugs, sorted.
    pub fn slugs(&self) -> Vec<&str> {
        let mut slugs: Vec<&str> = self.targets.keys().map(String::as_str).collect();
        slugs.sort_unstable();
        slugs
    }
}

fn build_target<F>(route: &RouteConfig, lookup: &F) -> Result<UpstreamTarget, ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let invalid = |reason: String| ValidationError::InvalidUpstream {
        slug: route.slug.clone(),
        upstream: route.upstream.clone(),
        reason,
    };

    let base = Url::parse(&route.upstream).map_err(|e| invalid(e.to_string()))?;
    let host = base
        .host_str()
        .ok_or_else(|| invalid("missing host".to_string()))?;
    let authority = match base.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let authority = HeaderValue::from_str(&authority).map_err(|e| invalid(e.to_string()))?;

    let mut inject_headers = HeaderMap::new();
    for injection in &route.inject_headers {
        let invalid_header = || ValidationError::InvalidHeaderName {
            slug: route.slug.clone(),
            name: injection.name.clone(),
        };
        let name = HeaderName::from_bytes(injection.name.as_bytes()).map_err(|_| invalid_header())?;

        let Some(secret) = lookup(&injection.value_env) else {
            tracing::warn!(
                slug = %route.slug,
                header = %name,
                env = %injection.value_env,
                "Injected header source is unset, skipping"
            );
            continue;
        };

        let mut value = HeaderValue::from_str(&format!("{}{}", injection.prefix, secret))
            .map_err(|_| invalid_header())?;
        value.set_sensitive(true);
        inject_headers.insert(name, value);
    }

    Ok(UpstreamTarget {
        slug: route.slug.clone(),
        base,
        authority,
        inject_headers,
    })
}
