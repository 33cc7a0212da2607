//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved UpstreamTarget + rewritten path + query
//!     → forwarder.rs (build outbound request, strip credential, send)
//!     → upstream service
//!     → forwarder.rs (relay status/headers/body)
//! ```

pub mod forwarder;

pub use forwarder::{ForwardRequest, Forwarder};
