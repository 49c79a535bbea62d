//! Metrics collection and export for the Parley server.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "parley_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "parley_connections_active";
    pub const FRAMES_TOTAL: &str = "parley_frames_total";
    pub const FRAMES_BYTES: &str = "parley_frames_bytes";
    pub const CHAT_MESSAGES_TOTAL: &str = "parley_chat_messages_total";
    pub const ROOMS_ACTIVE: &str = "parley_rooms_active";
    pub const REACTIONS_TOTAL: &str = "parley_reactions_total";
    pub const ERRORS_TOTAL: &str = "parley_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of active connections"
    );
    metrics::describe_counter!(names::FRAMES_TOTAL, "Total number of wire frames processed");
    metrics::describe_counter!(names::FRAMES_BYTES, "Total bytes of wire frames processed");
    metrics::describe_counter!(
        names::CHAT_MESSAGES_TOTAL,
        "Total number of chat messages routed"
    );
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Current number of rooms");
    metrics::describe_counter!(names::REACTIONS_TOTAL, "Total number of reaction toggles");
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a wire frame.
pub fn record_frame(bytes: usize, direction: &str) {
    counter!(names::FRAMES_TOTAL, "direction" => direction.to_string()).increment(1);
    counter!(names::FRAMES_BYTES, "direction" => direction.to_string()).increment(bytes as u64);
}

/// Record a routed chat message.
pub fn record_chat_message(kind: &str) {
    counter!(names::CHAT_MESSAGES_TOTAL, "kind" => kind.to_string()).increment(1);
}

/// Record a reaction toggle.
pub fn record_reaction() {
    counter!(names::REACTIONS_TOTAL).increment(1);
}

/// Update the active room count.
pub fn set_active_rooms(count: usize) {
    gauge!(names::ROOMS_ACTIVE).set(count as f64);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
