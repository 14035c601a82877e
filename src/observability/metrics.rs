//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by verb, status, route
//! - `gateway_request_duration_seconds` (histogram): latency by verb, route
//! - `gateway_generation` (gauge): id of the active config generation
//! - `gateway_dispatch_retries_total` (counter): backend retries by protocol
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Route label is the template, never the raw path (bounded cardinality)
//! - Recording is a no-op until an exporter is installed

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(verb: &str, status: u16, route: &str, started: Instant) {
    counter!(
        "gateway_requests_total",
        "verb" => verb.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);

    histogram!(
        "gateway_request_duration_seconds",
        "verb" => verb.to_string(),
        "route" => route.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_generation(id: u64) {
    gauge!("gateway_generation").set(id as f64);
}

pub fn record_retry(protocol: &str) {
    counter!("gateway_dispatch_retries_total", "protocol" => protocol.to_string()).increment(1);
}
