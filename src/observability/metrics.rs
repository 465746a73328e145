//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, route, status
//! - `http_request_duration_seconds` (histogram): latency by method, route
//! - `http_server_errors_total` (counter): 5xx responses by route
//! - `http_requests_in_flight` (gauge): admitted requests still executing
//! - `http_rate_limited_total` (counter): requests refused by the rate bucket
//! - `http_requests_cancelled_total` (counter): cancellations by stage, reason
//! - `http_panics_total` (counter): panics caught by containment
//! - `idempotency_replays_total` (counter): responses served from the record
//! - `user_cache_hits_total` (counter): user lookups by `result=hit|miss`
//!
//! # Design Decisions
//! - Labels use route templates, never concrete paths
//! - Without an installed recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let status_label = status.to_string();
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status_label
    )
    .increment(1);
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", "route" => route.to_string()).increment(1);
    }
}

pub fn in_flight_started() {
    gauge!("http_requests_in_flight").increment(1.0);
}

pub fn in_flight_finished() {
    gauge!("http_requests_in_flight").decrement(1.0);
}

pub fn record_rate_limited() {
    counter!("http_rate_limited_total").increment(1);
}

pub fn record_cancelled(stage: &'static str, reason: &'static str) {
    counter!("http_requests_cancelled_total", "stage" => stage, "reason" => reason).increment(1);
}

pub fn record_panic(route: &str) {
    counter!("http_panics_total", "route" => route.to_string()).increment(1);
}

pub fn record_idempotent_replay() {
    counter!("idempotency_replays_total").increment(1);
}

pub fn record_user_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("user_cache_hits_total", "result" => result).increment(1);
}
