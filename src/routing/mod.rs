//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming path `/t/<slug>/<rest...>`
//!     → rewrite.rs (extract slug)
//!     → router.rs (slug → UpstreamTarget, or UnknownSlug)
//!     → rewrite.rs (`/<rest...>` forwarded upstream)
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Parse upstream URLs, resolve injected headers
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Exact slug match only
//! - Deterministic: same input always resolves to the same upstream

pub mod rewrite;
pub mod router;

pub use rewrite::{extract_slug, rewrite, PROXY_PREFIX};
pub use router::{RouteTable, UpstreamTarget};
