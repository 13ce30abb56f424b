//! Prometheus metrics for monitoring the session server.
//!
//! Metrics are exposed in Prometheus text format on a dedicated listener.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts and duration by route
//! - **WebSocket Metrics**: Active connections, messages sent/received
//! - **Game Metrics**: Sessions, intents, resolutions, finished games
//! - **Rate Limiting Metrics**: Dropped client messages
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use mafia_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/sessions", 201);
//! ```

use mafia::entities::{Resolution, Winner};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`. Until this is
/// called, recording is a no-op.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Track a WebSocket connection opening.
pub fn websocket_connected() {
    metrics::counter!("websocket_connections_total").increment(1);
    metrics::gauge!("websocket_connections_active").increment(1.0);
}

/// Track a WebSocket connection closing.
pub fn websocket_disconnected() {
    metrics::gauge!("websocket_connections_active").decrement(1.0);
}

pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Set current registered sessions count.
pub fn active_sessions(count: usize) {
    metrics::gauge!("active_sessions").set(count as f64);
}

pub fn sessions_created_total() {
    metrics::counter!("sessions_created_total").increment(1);
}

/// Count an applied intent by kind and outcome (`ok` or the error code).
pub fn intents_total(kind: &str, outcome: &str) {
    metrics::counter!("intents_total",
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Count a completed night or day.
pub fn resolutions_total(resolution: &Resolution) {
    let (phase, eliminated) = match resolution {
        Resolution::Night { killed, .. } => ("night", killed.is_some()),
        Resolution::Day { executed, .. } => ("day", executed.is_some()),
    };
    metrics::counter!("resolutions_total",
        "phase" => phase,
        "eliminated" => eliminated.to_string()
    )
    .increment(1);
}

pub fn games_ended_total(winner: Winner) {
    metrics::counter!("games_ended_total",
        "winner" => winner.to_string()
    )
    .increment(1);
}

// ============================================================================
// Rate Limiting Metrics
// ============================================================================

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total(window: &str) {
    metrics::counter!("rate_limit_hits_total",
        "window" => window.to_string()
    )
    .increment(1);
}
