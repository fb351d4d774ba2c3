//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatehouse_requests_total` (counter): requests by route and status
//! - `gatehouse_request_duration_seconds` (histogram): latency by route
//! - `gatehouse_guard_rejections_total` (counter): rejections by guard
//!
//! # Design Decisions
//! - The `metrics` facade keeps call sites cheap; the Prometheus exporter is
//!   only installed when enabled in configuration

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(error = %e, "Failed to install Prometheus exporter");
    } else {
        tracing::info!(address = %addr, "Metrics endpoint available");
    }
}

/// Record one finished request.
pub fn record_request(route: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gatehouse_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "gatehouse_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a request rejected by a guard.
pub fn record_guard_rejection(guard: &'static str) {
    metrics::counter!("gatehouse_guard_rejections_total", "guard" => guard).increment(1);
}
