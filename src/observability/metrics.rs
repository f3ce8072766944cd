//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): time to response head
//! - `proxy_upstream_errors_total` (counter): failed dispatches
//! - `proxy_relayed_bytes_total` (counter): body bytes streamed to callers
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape listener. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a finished request head.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let method = method.to_string();
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "method" => method)
        .record(start.elapsed().as_secs_f64());
}

/// Record a dispatch that never produced an upstream response.
pub fn record_upstream_error() {
    metrics::counter!("proxy_upstream_errors_total").increment(1);
}

/// Record body bytes relayed for one response.
pub fn record_relayed_bytes(bytes: u64) {
    metrics::counter!("proxy_relayed_bytes_total").increment(bytes);
}
