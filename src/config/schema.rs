//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits so the route table can be read from a file.

use serde::{Deserialize, Serialize};

/// Slug and upstream used when neither `ROUTES` nor `ROUTES_FILE` is given.
pub const DEFAULT_ROUTE_SLUG: &str = "wetrust";
pub const DEFAULT_ROUTE_UPSTREAM: &str = "https://net-api.mbtaroblox.com";

/// Root configuration for the gateway.
///
/// Built once at startup and shared read-only with every component.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Shared-secret and origin policy.
    pub auth: AuthConfig,

    /// Per-client quota settings.
    pub rate_limit: RateLimitConfig,

    /// Upstream timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Route table entries mapping slugs to upstreams.
    pub routes: Vec<RouteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Credential and CORS policy.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret expected in `X-Proxy-Key`.
    pub proxy_key: String,

    /// Exact origins allowed to call the gateway. Empty allows any origin.
    pub allow_origins: Vec<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("proxy_key", &"<redacted>")
            .field("allow_origins", &self.allow_origins)
            .finish()
    }
}

/// Fixed-window quota configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests admitted per client per window.
    pub points: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            points: 60,
            window_secs: 60,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for connect and full round-trip, in milliseconds.
    pub upstream_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { upstream_ms: 15_000 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// Take the client identity from `X-Forwarded-For` instead of the peer address.
    pub trust_proxy: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 256 * 1024,
            trust_proxy: false,
        }
    }
}

/// One route table entry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Path segment selecting this upstream.
    pub slug: String,

    /// Upstream base URL (scheme + host, optional port).
    pub upstream: String,

    /// Headers set on every request forwarded to this upstream.
    #[serde(default)]
    pub inject_headers: Vec<HeaderInjection>,
}

impl RouteConfig {
    pub fn new(slug: impl Into<String>, upstream: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            upstream: upstream.into(),
            inject_headers: Vec::new(),
        }
    }
}

/// A header whose value is read from the environment at startup.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HeaderInjection {
    /// Header name set on the outbound request.
    pub name: String,

    /// Environment variable holding the value.
    pub value_env: String,

    /// Literal prepended to the value (e.g. "Bearer ").
    #[serde(default)]
    pub prefix: String,
}

/// Route file layout (`ROUTES_FILE`).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RoutesFile {
    pub routes: Vec<RouteConfig>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus exporter bind address; disabled when absent.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}
