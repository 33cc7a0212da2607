//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a hard deadline
//! - Cancel the in-flight call cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Timed-out requests return 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use crate::http::response::GatewayError;

/// Run `fut` with a deadline. The future is dropped when the deadline fires,
/// which closes any connection it owns.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::UpstreamTimeout(deadline)),
    }
}
