//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by slug and status
//! - `gateway_rejections_total` (counter): pipeline rejections by reason
//! - `gateway_upstream_duration_seconds` (histogram): upstream latency by slug
//! - `gateway_quota_clients` (gauge): identities holding a quota window
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

pub mod names {
    pub const REQUESTS_TOTAL: &str = "gateway_requests_total";
    pub const REJECTIONS_TOTAL: &str = "gateway_rejections_total";
    pub const UPSTREAM_DURATION_SECONDS: &str = "gateway_upstream_duration_seconds";
    pub const QUOTA_CLIENTS: &str = "gateway_quota_clients";
}

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(names::REQUESTS_TOTAL, "Proxied requests by slug and status");
    describe_counter!(names::REJECTIONS_TOTAL, "Requests rejected by the gateway");
    describe_histogram!(
        names::UPSTREAM_DURATION_SECONDS,
        "Time spent waiting on the upstream"
    );
    describe_gauge!(names::QUOTA_CLIENTS, "Clients with an active quota window");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(slug: &str, status: u16) {
    counter!(
        names::REQUESTS_TOTAL,
        "slug" => slug.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_rejection(reason: &'static str) {
    counter!(names::REJECTIONS_TOTAL, "reason" => reason).increment(1);
}

pub fn record_upstream_duration(slug: &str, start: Instant) {
    histogram!(names::UPSTREAM_DURATION_SECONDS, "slug" => slug.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_quota_clients(count: usize) {
    gauge!(names::QUOTA_CLIENTS).set(count as f64);
}
