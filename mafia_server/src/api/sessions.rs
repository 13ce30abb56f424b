//! Session management API handlers.
//!
//! Every mutating endpoint is a thin wrapper that builds an [`Intent`],
//! applies it through the session manager and answers with the acting
//! player's view of the post-operation state.
//!
//! # Examples
//!
//! Create a session:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/sessions \
//!   -H "Content-Type: application/json" \
//!   -d '{"session_id": "friday", "host_id": "alice"}'
//! ```
//!
//! Vote during the day:
//! ```bash
//! curl -X POST http://localhost:6969/api/v1/sessions/friday/vote \
//!   -H "Content-Type: application/json" \
//!   -d '{"voter_id": "alice", "target_id": "bob"}'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use mafia::{
    GameError, Intent, constants, SessionId, StateChangeNotification,
    entities::{GameSnapshot, GameView, NightActionKind, Phase, PlayerId, SessionSummary},
};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{AppState, error::ApiError, error::game_error_code};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Generated when absent or blank
    #[serde(default)]
    pub session_id: Option<SessionId>,
    pub host_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct JoinSessionRequest {
    pub player_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct NightActionRequest {
    pub actor_id: PlayerId,
    pub action: NightActionKind,
    pub target_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub voter_id: PlayerId,
    pub target_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    pub player_id: Option<PlayerId>,
}

/// List all active sessions.
///
/// # Response
///
/// Returns `200 OK` with session summaries ordered by id:
/// ```json
/// [
///   {
///     "id": "friday",
///     "host_id": "alice",
///     "player_count": 5,
///     "max_players": 8,
///     "phase": "night",
///     "winner": null
///   }
/// ]
/// ```
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.session_manager.list().await)
}

/// Create a session hosted by `host_id`.
///
/// # Response
///
/// Returns `201 Created` with the host's view of the new lobby.
///
/// # Errors
///
/// - `400 Bad Request`: The host id is blank or too long
/// - `409 Conflict`: The session id is taken
/// - `503 Service Unavailable`: The session limit is reached
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<GameView>), ApiError> {
    let session_id = request.session_id.unwrap_or_default();
    let intent = Intent::CreateSession {
        host_id: request.host_id,
    };
    let view = run_intent(&state, &session_id, intent).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Get a session as seen by `player_id`, or by an observer when omitted.
///
/// # Errors
///
/// - `404 Not Found`: Session doesn't exist
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<GameView>, ApiError> {
    let handle = state.session_manager.get(&session_id).await?;
    Ok(Json(handle.view(query.player_id).await?))
}

/// Tear a session down. Connected WebSocket clients are disconnected.
///
/// # Errors
///
/// - `404 Not Found`: Session doesn't exist
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<StatusCode, ApiError> {
    state.session_manager.remove(&session_id).await?;
    metrics::active_sessions(state.session_manager.session_count().await);
    Ok(StatusCode::NO_CONTENT)
}

/// Join a session's lobby.
///
/// # Errors
///
/// - `409 Conflict`: Game already started, full, or the player already joined
pub async fn join_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<JoinSessionRequest>,
) -> Result<Json<GameView>, ApiError> {
    let intent = Intent::JoinSession {
        player_id: request.player_id,
    };
    run_intent(&state, &session_id, intent).await.map(Json)
}

/// Deal roles and begin the first night.
///
/// The response is personalized when `player_id` is given in the query.
///
/// # Errors
///
/// - `409 Conflict`: Session is not waiting for players
/// - `422 Unprocessable Entity`: Not enough players
pub async fn start_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<GameView>, ApiError> {
    let snapshot = apply(&state, &session_id, Intent::StartSession).await?;
    Ok(Json(snapshot.view_for(query.player_id.as_ref())))
}

/// Submit a night action. The night resolves when the last one arrives.
///
/// # Errors
///
/// - `409 Conflict`: Not night
/// - `422 Unprocessable Entity`: Unknown or dead actor/target, or the
///   actor's role can't perform the action
pub async fn submit_night_action(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<NightActionRequest>,
) -> Result<Json<GameView>, ApiError> {
    let intent = Intent::SubmitNightAction {
        actor_id: request.actor_id,
        action: request.action,
        target_id: request.target_id,
    };
    run_intent(&state, &session_id, intent).await.map(Json)
}

/// Submit a day vote. The day resolves when every living player has voted.
///
/// # Errors
///
/// - `409 Conflict`: Not day
/// - `422 Unprocessable Entity`: Unknown or dead voter/target
pub async fn submit_vote(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<GameView>, ApiError> {
    let intent = Intent::SubmitVote {
        voter_id: request.voter_id,
        target_id: request.target_id,
    };
    run_intent(&state, &session_id, intent).await.map(Json)
}

/// Apply a raw intent, e.g. `{"type": "submit_vote", "voter_id": "a", "target_id": "b"}`.
pub async fn apply_intent(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(intent): Json<Intent>,
) -> Result<(StatusCode, Json<GameView>), ApiError> {
    let status = match intent {
        Intent::CreateSession { .. } => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    let view = run_intent(&state, &session_id, intent).await?;
    Ok((status, Json(view)))
}

/// Full session state, unmasked, for persistence.
pub async fn export_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<GameSnapshot>, ApiError> {
    let handle = state.session_manager.get(&session_id).await?;
    Ok(Json(handle.snapshot().await?))
}

/// Apply an intent and render the issuing player's view of the result.
pub(crate) async fn run_intent(
    state: &AppState,
    session_id: &str,
    intent: Intent,
) -> Result<GameView, ApiError> {
    let viewer = intent.player_id().cloned();
    let snapshot = apply(state, session_id, intent).await?;
    Ok(snapshot.view_for(viewer.as_ref()))
}

/// Validate player ids, then apply an intent with logging and metrics.
async fn apply(
    state: &AppState,
    session_id: &str,
    intent: Intent,
) -> Result<GameSnapshot, ApiError> {
    if let Some(id) = intent
        .player_id()
        .into_iter()
        .chain(intent.target_id())
        .find(|id| !id.is_valid())
    {
        metrics::intents_total(intent.kind(), "bad_request");
        return Err(ApiError::BadRequest(format!(
            "player id must be 1-{} characters, got {}",
            constants::MAX_PLAYER_ID_LENGTH,
            id.as_str().chars().count()
        )));
    }

    let creating = matches!(intent, Intent::CreateSession { .. });
    let kind = intent.kind();
    let player_id = intent.player_id().cloned();

    match state.session_manager.apply(session_id, intent).await {
        Ok(snapshot) => {
            metrics::intents_total(kind, "ok");
            if creating {
                on_session_created(state, &snapshot.id).await;
            }
            Ok(snapshot)
        }
        Err(e) => {
            metrics::intents_total(kind, game_error_code(&e));
            logging::log_rejected_intent(&session_id.to_string(), kind, player_id.as_ref(), &e);
            Err(e.into())
        }
    }
}

async fn on_session_created(state: &AppState, session_id: &SessionId) {
    metrics::sessions_created_total();
    metrics::active_sessions(state.session_manager.session_count().await);

    if let Err(e) = spawn_session_observer(state, session_id).await {
        tracing::warn!(session_id = %session_id, error = %e, "Failed to observe session");
    }
}

/// Follow a session's notifications to keep game metrics current.
async fn spawn_session_observer(state: &AppState, session_id: &SessionId) -> Result<(), GameError> {
    let handle = state.session_manager.get(session_id).await?;
    let (tx, mut rx) = mpsc::channel(state.limits.notification_buffer);
    handle.subscribe(Uuid::new_v4(), tx).await?;

    let manager = state.session_manager.clone();
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            match notification {
                StateChangeNotification::Resolved { resolution, phase } => {
                    metrics::resolutions_total(&resolution);
                    if phase == Phase::Ended
                        && let Ok(summary) = handle.summary().await
                        && let Some(winner) = summary.winner
                    {
                        tracing::info!(
                            session_id = %summary.id,
                            winner = %winner,
                            "Game over"
                        );
                        metrics::games_ended_total(winner);
                    }
                }
                StateChangeNotification::Closed => break,
                StateChangeNotification::PlayerJoined { .. }
                | StateChangeNotification::GameStarted => {}
            }
        }
        metrics::active_sessions(manager.session_count().await);
    });

    Ok(())
}
