//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (enforce connect/round-trip deadline)
//!     → On failure: surfaced to the caller as-is
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No automatic retries: upstream transient failures are surfaced, not masked

pub mod timeouts;

pub use timeouts::with_deadline;
