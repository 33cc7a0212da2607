//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access_control.rs (origin allow-list, then X-Proxy-Key)
//!     → rate_limit.rs (per-client fixed window)
//!     → limits.rs (request body size)
//!     → headers.rs (strip credential, rewrite Host, add X-Forwarded-*)
//!     → Pass to upstream
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod access_control;
pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use access_control::{AccessGate, PROXY_KEY_HEADER};
pub use rate_limit::{ClientIdentity, QuotaDecision, QuotaTracker};
