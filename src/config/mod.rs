//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CLI flags / environment (PORT, PROXY_KEY, ALLOW_ORIGINS, TIMEOUT_MS, ...)
//!     → loader.rs (clap parse, optional TOML route file)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed by value/Arc to each component constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no pipeline stage reads the environment
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde/clap) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{CliArgs, ConfigError};
pub use schema::GatewayConfig;
pub use schema::{
    AuthConfig, HeaderInjection, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig,
    RouteConfig, SecurityConfig, TimeoutConfig,
};
