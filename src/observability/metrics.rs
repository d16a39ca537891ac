//! Metrics collection and exposition.
//!
//! # Metrics
//! - `audit_captures_total` (counter): captures by outcome (`ok`, `host`,
//!   `header`, `body`)
//! - `audit_capture_duration_seconds` (histogram): time spent capturing
//! - `audit_dispatch_total` (counter): dispatch attempts by route, outcome
//! - `audit_dispatch_duration_seconds` (histogram): time spent in sinks

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_capture(outcome: &'static str, started: Instant) {
    counter!("audit_captures_total", "outcome" => outcome).increment(1);
    histogram!("audit_capture_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_dispatch(route: &'static str, outcome: &'static str, started: Instant) {
    counter!("audit_dispatch_total", "route" => route, "outcome" => outcome).increment(1);
    histogram!("audit_dispatch_duration_seconds", "route" => route)
        .record(started.elapsed().as_secs_f64());
}
