//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (exchanges, rejections, upstream connects, connections)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_exchanges_total` (counter): relayed request/response pairs
//! - `proxy_rejected_total` (counter): requests refused, by reason
//! - `proxy_upstream_connects_total` (counter): origin connections opened
//! - `proxy_active_connections` (gauge): current client connection count
//! - `proxy_exchange_duration_seconds` (histogram): request read to response written
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Low-overhead metric updates (atomic operations)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_exchange(started: Instant) {
    metrics::counter!("proxy_exchanges_total").increment(1);
    metrics::histogram!("proxy_exchange_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_rejected(reason: &'static str) {
    metrics::counter!("proxy_rejected_total", "reason" => reason).increment(1);
}

pub fn record_upstream_connect() {
    metrics::counter!("proxy_upstream_connects_total").increment(1);
}

pub fn set_active_connections(count: usize) {
    metrics::gauge!("proxy_active_connections").set(count as f64);
}
