//! Configuration loading from command-line flags, environment and disk.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

use crate::config::schema::{
    GatewayConfig, LogFormat, RouteConfig, RoutesFile, DEFAULT_ROUTE_SLUG, DEFAULT_ROUTE_UPSTREAM,
};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {0} env var")]
    Missing(&'static str),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid route entry `{0}`, expected slug=url")]
    RouteEntry(String),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command-line flags; every flag can also be supplied through its env var.
#[derive(Debug, Clone, Parser)]
#[command(name = "slug-gateway")]
#[command(about = "Authenticated slug-routing reverse proxy", long_about = None)]
pub struct CliArgs {
    /// Listen port.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Listen host.
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Shared secret callers send in `X-Proxy-Key`.
    #[arg(long, env = "PROXY_KEY", hide_env_values = true)]
    pub proxy_key: Option<String>,

    /// Comma-separated list of full origins (scheme://host[:port]).
    #[arg(long, env = "ALLOW_ORIGINS", default_value = "")]
    pub allow_origins: String,

    /// Upstream connect and round-trip deadline.
    #[arg(long, env = "TIMEOUT_MS", default_value_t = 15_000)]
    pub timeout_ms: u64,

    #[arg(long, env = "RATE_LIMIT_POINTS", default_value_t = 60)]
    pub rate_limit_points: u32,

    #[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = 60)]
    pub rate_limit_window_secs: u64,

    #[arg(long, env = "MAX_BODY_BYTES", default_value_t = 256 * 1024)]
    pub max_body_bytes: usize,

    /// Identify clients by the first `X-Forwarded-For` entry.
    #[arg(long, env = "TRUST_PROXY", default_value_t = false)]
    pub trust_proxy: bool,

    /// Inline route table: `slug=https://base,slug2=https://other`.
    #[arg(long, env = "ROUTES", conflicts_with = "routes_file")]
    pub routes: Option<String>,

    /// TOML route table with optional header injection.
    #[arg(long, env = "ROUTES_FILE")]
    pub routes_file: Option<PathBuf>,

    /// Prometheus exporter address, e.g. 0.0.0.0:9090.
    #[arg(long, env = "METRICS_ADDR")]
    pub metrics_addr: Option<String>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl CliArgs {
    /// Assemble and validate the gateway configuration.
    pub fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let proxy_key = self
            .proxy_key
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::Missing("PROXY_KEY"))?;

        let routes = match (&self.routes, &self.routes_file) {
            (_, Some(path)) => load_routes_file(path)?,
            (Some(inline), None) => parse_routes(inline)?,
            (None, None) => vec![RouteConfig::new(DEFAULT_ROUTE_SLUG, DEFAULT_ROUTE_UPSTREAM)],
        };

        let mut config = GatewayConfig::default();
        config.listener.bind_address = format!("{}:{}", self.bind_addr, self.port);
        config.auth.proxy_key = proxy_key;
        config.auth.allow_origins = parse_origins(&self.allow_origins);
        config.timeouts.upstream_ms = self.timeout_ms;
        config.rate_limit.points = self.rate_limit_points;
        config.rate_limit.window_secs = self.rate_limit_window_secs;
        config.security.max_body_size = self.max_body_bytes;
        config.security.trust_proxy = self.trust_proxy;
        config.routes = routes;
        config.observability.log_level = self.log_level;
        config.observability.log_format = self.log_format;
        config.observability.metrics_address = self.metrics_addr;

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Split `ALLOW_ORIGINS`, trimming entries and dropping empty ones.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse the inline `slug=url` list.
pub fn parse_routes(raw: &str) -> Result<Vec<RouteConfig>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (slug, upstream) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::RouteEntry(entry.to_string()))?;
            Ok(RouteConfig::new(slug.trim(), upstream.trim()))
        })
        .collect()
}

/// Load the route table from a TOML file.
pub fn load_routes_file(path: &Path) -> Result<Vec<RouteConfig>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: RoutesFile = toml::from_str(&content)?;
    Ok(file.routes)
}
