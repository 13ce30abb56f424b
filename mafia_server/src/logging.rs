//! Structured logging configuration.
//!
//! The game library logs through the `log` facade; the subscriber installed
//! here also captures those records so both end up in one stream.

use mafia::{GameError, SessionId, entities::PlayerId};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the RUST_LOG env var.
///
/// # Example
///
/// ```no_run
/// use mafia_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,tower_http=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log an intent the game refused
///
/// # Arguments
///
/// * `session_id` - Session the intent targeted
/// * `intent` - Intent kind (e.g. `submit_vote`)
/// * `player_id` - Player who sent it, if known
/// * `error` - Why it was refused
pub fn log_rejected_intent(
    session_id: &SessionId,
    intent: &str,
    player_id: Option<&PlayerId>,
    error: &GameError,
) {
    tracing::info!(
        session_id = %session_id,
        intent = intent,
        player_id = player_id.map(PlayerId::as_str),
        error = %error,
        "Intent rejected"
    );
}

/// Log a WebSocket message dropped by the rate limiter
pub fn log_rate_limited(session_id: &SessionId, player_id: Option<&PlayerId>, window: &str) {
    tracing::warn!(
        session_id = %session_id,
        player_id = player_id.map(PlayerId::as_str),
        window = window,
        "Rate limit exceeded, message dropped"
    );
}
