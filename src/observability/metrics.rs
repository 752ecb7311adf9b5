//! Metrics collection and exposition.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus recorder");

    tracing::info!(address = %addr, "Metrics server listening");
}

/// Record one proxied request at the boundary.
pub fn record_request(method: &str, status: u16, target: &str, started: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("target", target.to_string()),
    ];

    counter!("gozero_requests_total", &labels).increment(1);
    histogram!("gozero_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());
}

/// Record one upstream retry.
pub fn record_retry(target: &str) {
    counter!("gozero_upstream_retries_total", "target" => target.to_string()).increment(1);
}

/// Record one routing event handed to the queue.
pub fn record_routing_event(host: &str) {
    counter!("gozero_routing_events_total", "host" => host.to_string()).increment(1);
}
