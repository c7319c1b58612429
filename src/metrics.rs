//! Prometheus metric recording helpers.
//!
//! Thin wrappers over the `metrics` macros so handlers record consistent
//! names and labels. With no recorder installed (unit tests) these are
//! no-ops.

use metrics::{counter, histogram};
use std::time::Instant;

/// Count a completed request per endpoint and status code.
pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "hlsproxy_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record request latency per endpoint.
pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("hlsproxy_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_hit() {
    counter!("hlsproxy_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    counter!("hlsproxy_cache_misses_total").increment(1);
}

pub fn record_origin_error() {
    counter!("hlsproxy_origin_errors_total").increment(1);
}

/// Count prefetch outcomes: `ok`, `skipped`, or `error`.
pub fn record_prefetch(outcome: &'static str) {
    counter!("hlsproxy_prefetch_total", "outcome" => outcome).increment(1);
}
