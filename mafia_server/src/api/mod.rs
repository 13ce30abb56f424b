//! HTTP/WebSocket API for the session server.
//!
//! # Modules
//!
//! - [`sessions`]: REST handlers for creating sessions and applying intents
//! - [`websocket`]: Live view pushes and in-band intents
//! - [`request_id`]: Request id propagation, request logging and HTTP metrics
//! - [`rate_limiter`]: Per-connection WebSocket rate limiting
//! - [`error`]: Mapping of session errors to HTTP statuses
//!
//! # Endpoints Overview
//!
//! ```text
//! GET    /health                                  - Server health status
//! GET    /api/v1/sessions                         - List sessions
//! POST   /api/v1/sessions                         - Create session
//! GET    /api/v1/sessions/{id}?player_id=<id>     - Session view
//! DELETE /api/v1/sessions/{id}                    - Tear session down
//! POST   /api/v1/sessions/{id}/join               - Join lobby
//! POST   /api/v1/sessions/{id}/start              - Deal roles, start first night
//! POST   /api/v1/sessions/{id}/night-action       - Submit night action
//! POST   /api/v1/sessions/{id}/vote               - Submit day vote
//! POST   /api/v1/sessions/{id}/intents            - Apply any intent
//! GET    /api/v1/sessions/{id}/export             - Full snapshot
//! GET    /ws/{id}?player_id=<id>                  - WebSocket
//! ```
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use mafia::{SessionConfig, SessionManager};
//! use mafia_server::{api::{AppState, create_router}, config::GatewayLimits};
//! use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let state = AppState {
//!     session_manager: Arc::new(SessionManager::new(SessionConfig::default())),
//!     limits: GatewayLimits::default(),
//! };
//!
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. In production, configure appropriate
//! origins, methods, and headers.

pub mod error;
pub mod rate_limiter;
pub mod request_id;
pub mod sessions;
pub mod websocket;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use mafia::SessionManager;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::config::GatewayLimits;

/// Application state shared across all HTTP handlers and WebSocket connections.
#[derive(Clone)]
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub limits: GatewayLimits,
}

/// Create the complete API router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    let root_routes = Router::new()
        .route("/health", get(health_check))
        .route("/ws/{session_id}", get(websocket::websocket_handler));

    Router::new()
        .merge(root_routes)
        .nest("/api/v1", create_v1_router())
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route(
            "/sessions",
            get(sessions::list_sessions).post(sessions::create_session),
        )
        .route(
            "/sessions/{session_id}",
            get(sessions::get_session).delete(sessions::delete_session),
        )
        .route("/sessions/{session_id}/join", post(sessions::join_session))
        .route("/sessions/{session_id}/start", post(sessions::start_session))
        .route(
            "/sessions/{session_id}/night-action",
            post(sessions::submit_night_action),
        )
        .route("/sessions/{session_id}/vote", post(sessions::submit_vote))
        .route("/sessions/{session_id}/intents", post(sessions::apply_intent))
        .route("/sessions/{session_id}/export", get(sessions::export_session))
}

/// Health check endpoint for monitoring and load balancers.
///
/// # Example
///
/// ```bash
/// curl http://localhost:6969/health
/// # {"status":"healthy","version":"0.1.0","sessions":{"active_count":2,"created_total":5},"timestamp":"..."}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let active_count = state.session_manager.session_count().await;
    crate::metrics::active_sessions(active_count);

    let response = json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": {
            "active_count": active_count,
            "created_total": state.session_manager.created_count(),
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (StatusCode::OK, Json(response))
}
