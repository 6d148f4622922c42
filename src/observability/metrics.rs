//! Metrics collection and exposition.
//!
//! # Metrics
//! - `swarm_launcher_stage` (gauge): index of the current supervisor stage
//! - `swarm_launcher_fatal_total` (counter): fatal failures by kind
//! - `swarm_rounds_total` (counter): completed game rounds
//! - `swarm_messages_total` (counter): frames by direction (`sent`, `received`,
//!   `dropped`, `oversized`)
//! - `swarm_connected_peers` (gauge): current peer count
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op
//! - Exporter is optional and bound before the backend

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_stage(index: u8) {
    gauge!("swarm_launcher_stage").set(index as f64);
}

pub fn record_fatal(kind: &'static str) {
    counter!("swarm_launcher_fatal_total", "kind" => kind).increment(1);
}

pub fn record_round() {
    counter!("swarm_rounds_total").increment(1);
}

pub fn record_message(direction: &'static str) {
    counter!("swarm_messages_total", "direction" => direction).increment(1);
}

pub fn record_connected_peers(count: usize) {
    gauge!("swarm_connected_peers").set(count as f64);
}
