//! Mafia session server using the async actor model.
//!
//! Each session runs in its own SessionActor task, registered with the
//! SessionManager. Clients talk to sessions over REST and WebSocket.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use log::info;
use mafia::SessionManager;
use mafia_server::{
    api::{self, AppState},
    config::ServerConfig,
    logging, metrics,
};
use pico_args::Arguments;

const HELP: &str = "\
Run a Mafia game session server

USAGE:
  mafia_server [OPTIONS]

OPTIONS:
  --bind          IP:PORT  Server socket bind address   [default: env SERVER_BIND or 127.0.0.1:6969]
  --metrics-bind  IP:PORT  Prometheus exporter address  [default: env METRICS_BIND, disabled if unset]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND             Prometheus exporter address
  MIN_PLAYERS              Players required to start      [default: 5]
  MAX_PLAYERS              Lobby capacity                 [default: 8]
  MAFIA_POLICY             standard | one_in_three        [default: standard]
  WIN_THRESHOLD            parity | majority              [default: parity]
  SESSION_INBOX_CAPACITY   Buffered requests per session  [default: 100]
  MAX_SESSIONS             Concurrent session limit       [default: 1000]
  WS_NOTIFICATION_BUFFER   Buffered updates per socket    [default: 32]
  RUST_LOG                 Log filter                     [default: info]
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let bind: Option<SocketAddr> = pargs.opt_value_from_str("--bind")?;
    let metrics_bind: Option<SocketAddr> = pargs.opt_value_from_str("--metrics-bind")?;

    logging::init();

    let config = ServerConfig::from_env(bind, metrics_bind)?;
    config.validate()?;

    info!(
        "Starting Mafia session server at {} ({}-{} players, {} mafia, {} win)",
        config.bind,
        config.session.rules.min_players,
        config.session.rules.max_players,
        config.session.rules.mafia_policy,
        config.session.rules.win_threshold
    );

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics exposed at http://{}/metrics", addr);
    }

    let session_manager =
        Arc::new(SessionManager::new(config.session).with_session_limit(config.limits.max_sessions));
    let api_state = AppState {
        session_manager: session_manager.clone(),
        limits: config.limits,
    };
    let app = api::create_router(api_state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    session_manager.shutdown().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        // Without a signal handler the server runs until killed.
        std::future::pending::<()>().await;
    }
}
