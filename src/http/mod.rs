//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, security headers, origin gate, CORS)
//!     → pipeline.rs (CORS → auth → quota → route → rewrite → forward)
//!     → response.rs (error taxonomy → status + JSON body)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::{AppState, Rejection, Stage};
pub use request::{request_id_of, request_span, X_REQUEST_ID};
pub use response::GatewayError;
pub use server::{build_router, HttpServer};
