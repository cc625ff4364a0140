//! Metrics collection and exposition.
//!
//! # Metrics
//! - `format_requests_total` (counter): formatting requests by outcome
//! - `format_duration_seconds` (histogram): formatter latency by outcome
//! - `retry_budget_rejections_total` (counter): retries turned away
//! - `trace_sampling_decisions_total` (counter): sampler decisions
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - Prometheus exporter is opt-in and bound on its own address

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::format::Outcome;

/// Install the Prometheus exporter with its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_format(outcome: Outcome, started: Instant) {
    let label = outcome.as_str();
    counter!("format_requests_total", "outcome" => label).increment(1);
    histogram!("format_duration_seconds", "outcome" => label)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_budget_rejection() {
    counter!("retry_budget_rejections_total").increment(1);
}

pub fn record_sampling(sampled: bool) {
    let label = if sampled { "true" } else { "false" };
    counter!("trace_sampling_decisions_total", "sampled" => label).increment(1);
}
