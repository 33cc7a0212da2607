//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde and clap handle syntactic)
//! - Check route table integrity (unique slugs, absolute upstream URLs)
//! - Validate value ranges (timeouts > 0, quota > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("PROXY_KEY must not be empty")]
    EmptyProxyKey,

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("route table is empty")]
    NoRoutes,

    #[error("invalid slug `{0}`")]
    InvalidSlug(String),

    #[error("duplicate slug `{0}`")]
    DuplicateSlug(String),

    #[error("invalid upstream `{upstream}` for slug `{slug}`: {reason}")]
    InvalidUpstream {
        slug: String,
        upstream: String,
        reason: String,
    },

    #[error("invalid injected header `{name}` for slug `{slug}`")]
    InvalidHeaderName { slug: String, name: String },

    #[error("invalid origin `{0}`")]
    InvalidOrigin(String),
}

/// Validate a fully assembled configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.proxy_key.is_empty() {
        errors.push(ValidationError::EmptyProxyKey);
    }
    if config.rate_limit.points == 0 {
        errors.push(ValidationError::NotPositive("RATE_LIMIT_POINTS"));
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::NotPositive("RATE_LIMIT_WINDOW_SECS"));
    }
    if config.timeouts.upstream_ms == 0 {
        errors.push(ValidationError::NotPositive("TIMEOUT_MS"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::NotPositive("MAX_BODY_BYTES"));
    }

    for origin in &config.auth.allow_origins {
        if !origin.contains("://") || origin.ends_with('/') {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }

    if config.routes.is_empty() {
        errors.push(ValidationError::NoRoutes);
    }

    let mut seen = HashSet::new();
    for route in &config.routes {
        if route.slug.is_empty() || route.slug.contains('/') {
            errors.push(ValidationError::InvalidSlug(route.slug.clone()));
        } else if !seen.insert(route.slug.as_str()) {
            errors.push(ValidationError::DuplicateSlug(route.slug.clone()));
        }

        if let Err(reason) = check_upstream(&route.upstream) {
            errors.push(ValidationError::InvalidUpstream {
                slug: route.slug.clone(),
                upstream: route.upstream.clone(),
                reason,
            });
        }

        for injection in &route.inject_headers {
            if HeaderName::from_bytes(injection.name.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidHeaderName {
                    slug: route.slug.clone(),
                    name: injection.name.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("unsupported scheme `{}`", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("query and fragment are not allowed".to_string());
    }
    Ok(())
}
