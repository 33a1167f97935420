//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define workflow metrics (ledger queries, signing requests, resolutions)
//! - Expose Prometheus-compatible metrics endpoint when enabled
//!
//! # Metrics
//! - `blackhole_ledger_queries_total` (counter): queries by command, outcome
//! - `blackhole_ledger_query_duration_seconds` (histogram): query latency
//! - `blackhole_signing_requests_total` (counter): submissions by kind, outcome
//! - `blackhole_resolutions_total` (counter): terminal wait outcomes
//! - `blackhole_open_notification_channels` (gauge): channels currently open
//! - `blackhole_validations_total` (counter): ledger re-checks by step, outcome
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Labels are static strings to keep cardinality bounded

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one ledger query.
pub fn record_ledger_query(command: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!("blackhole_ledger_queries_total", "command" => command, "outcome" => outcome)
        .increment(1);
    histogram!("blackhole_ledger_query_duration_seconds", "command" => command)
        .record(elapsed.as_secs_f64());
}

/// Record one signing request submission.
pub fn record_signing_request(kind: &'static str, outcome: &'static str) {
    counter!("blackhole_signing_requests_total", "kind" => kind, "outcome" => outcome).increment(1);
}

/// Record the terminal outcome of a wait.
pub fn record_resolution(outcome: &'static str) {
    counter!("blackhole_resolutions_total", "outcome" => outcome).increment(1);
}

/// Track notification channel opens and closes.
pub fn record_channel_open() {
    gauge!("blackhole_open_notification_channels").increment(1.0);
}

pub fn record_channel_close() {
    gauge!("blackhole_open_notification_channels").decrement(1.0);
}

/// Record the result of a post-signing validation.
pub fn record_validation(step: &'static str, success: bool) {
    let outcome = if success { "success" } else { "mismatch" };
    counter!("blackhole_validations_total", "step" => step, "outcome" => outcome).increment(1);
}
