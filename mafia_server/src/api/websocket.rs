//! WebSocket handler for live session updates.
//!
//! # Connection Flow
//!
//! 1. Client connects via `GET /ws/{session_id}?player_id=<id>`
//!    (omit `player_id` to watch as an observer)
//! 2. Server subscribes to the session and sends the current view
//! 3. Every state change pushes a fresh view personalized for the player
//! 4. Client messages are applied as intents and answered with a
//!    success or error frame
//! 5. When the session is torn down the server sends `closed` and hangs up
//!
//! # Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:6969/ws/friday?player_id=alice');
//!
//! ws.onmessage = (event) => {
//!   const data = JSON.parse(event.data);
//!   if (data.type === "view") {
//!     render(data.view);
//!   }
//! };
//!
//! ws.send(JSON.stringify({
//!   type: "night_action",
//!   action: "inspect",
//!   target_id: "bob"
//! }));
//! ```

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use log::{error, info, warn};
use mafia::{
    Intent, SessionHandle, SessionId, StateChangeNotification,
    entities::{GameView, NightActionKind, PlayerId},
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    AppState,
    error::ApiError,
    rate_limiter::MessageRateLimiter,
    sessions::run_intent,
};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    player_id: Option<PlayerId>,
}

/// Client messages received via WebSocket. The acting player is the one
/// named in the connection's query string.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the lobby
    Join,
    /// Deal roles and begin the first night
    Start,
    /// Use a night ability
    NightAction {
        action: NightActionKind,
        target_id: PlayerId,
    },
    /// Vote during the day
    Vote { target_id: PlayerId },
}

/// Messages sent to the client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current session state for this connection
    View { view: GameView },
    Success { message: String, view: GameView },
    Error { error: String, message: String },
    /// The session was torn down
    Closed,
}

impl From<ApiError> for ServerMessage {
    fn from(err: ApiError) -> Self {
        Self::Error {
            error: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Turn a client message into an intent for `player_id`.
///
/// Observers (no player id) may only start the game.
pub fn to_intent(message: ClientMessage, player_id: Option<&PlayerId>) -> Result<Intent, ServerMessage> {
    let require_player = || {
        player_id.cloned().ok_or_else(|| ServerMessage::Error {
            error: "observer".to_string(),
            message: "Observers can't act. Reconnect with ?player_id=<id>".to_string(),
        })
    };

    Ok(match message {
        ClientMessage::Join => Intent::JoinSession {
            player_id: require_player()?,
        },
        ClientMessage::Start => Intent::StartSession,
        ClientMessage::NightAction { action, target_id } => Intent::SubmitNightAction {
            actor_id: require_player()?,
            action,
            target_id,
        },
        ClientMessage::Vote { target_id } => Intent::SubmitVote {
            voter_id: require_player()?,
            target_id,
        },
    })
}

/// Upgrade an HTTP connection to a WebSocket bound to one session.
///
/// # Response
///
/// On success, upgrades connection to WebSocket protocol (101 Switching Protocols).
/// Returns `404 Not Found` when the session doesn't exist.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<SessionId>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let handle = match state.session_manager.get(&session_id).await {
        Ok(handle) => handle,
        Err(e) => return ApiError::from(e).into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, handle, query.player_id, state))
}

/// Handle an established WebSocket connection.
///
/// A send task forwards views and responses to the client while this task
/// reads client messages. Either side ending closes the connection.
async fn handle_socket(
    socket: WebSocket,
    handle: SessionHandle,
    player_id: Option<PlayerId>,
    state: AppState,
) {
    let session_id = handle.session_id().clone();
    let viewer = player_id
        .as_ref()
        .map(PlayerId::as_str)
        .unwrap_or("observer")
        .to_string();
    let (mut sender, mut receiver) = socket.split();

    metrics::websocket_connected();
    info!("WebSocket connected: session={}, player={}", session_id, viewer);

    let subscriber_id = Uuid::new_v4();
    let (notification_tx, mut notification_rx) =
        mpsc::channel::<StateChangeNotification>(state.limits.notification_buffer);

    if let Err(e) = handle.subscribe(subscriber_id, notification_tx).await {
        error!("Failed to subscribe to session {}: {}", session_id, e);
        let _ = send_message(&mut sender, &ServerMessage::from(ApiError::from(e))).await;
        metrics::websocket_disconnected();
        return;
    }

    match handle.view(player_id.clone()).await {
        Ok(view) => {
            if send_message(&mut sender, &ServerMessage::View { view })
                .await
                .is_err()
            {
                let _ = handle.unsubscribe(subscriber_id).await;
                metrics::websocket_disconnected();
                return;
            }
        }
        Err(e) => warn!("Failed to get initial view for session {}: {}", session_id, e),
    }

    let (response_tx, mut response_rx) = mpsc::channel::<ServerMessage>(32);

    let send_handle = handle.clone();
    let send_viewer = player_id.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                notification = notification_rx.recv() => {
                    match notification {
                        Some(StateChangeNotification::Closed) | None => {
                            let _ = send_message(&mut sender, &ServerMessage::Closed).await;
                            break;
                        }
                        Some(_) => match send_handle.view(send_viewer.clone()).await {
                            Ok(view) => {
                                if send_message(&mut sender, &ServerMessage::View { view }).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("Failed to get view for session {}: {}", send_handle.session_id(), e);
                                let _ = send_message(&mut sender, &ServerMessage::Closed).await;
                                break;
                            }
                        },
                    }
                }
                Some(message) = response_rx.recv() => {
                    if send_message(&mut sender, &message).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sender.close().await;
    });

    let mut limiter = MessageRateLimiter::default();

    loop {
        tokio::select! {
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    metrics::websocket_messages_received();

                    if let Err(limit) = limiter.check() {
                        metrics::rate_limit_hits_total(limit.window());
                        logging::log_rate_limited(&session_id, player_id.as_ref(), limit.window());
                        let response = ServerMessage::Error {
                            error: "rate_limited".to_string(),
                            message: limit.client_message(),
                        };
                        if response_tx.send(response).await.is_err() {
                            break;
                        }
                        continue;
                    }

                    let response = match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => {
                            handle_client_message(client_msg, &session_id, player_id.as_ref(), &state).await
                        }
                        Err(e) => {
                            warn!("Failed to parse client message: {}", e);
                            ServerMessage::Error {
                                error: "invalid_message".to_string(),
                                message: "Invalid message format".to_string(),
                            }
                        }
                    };

                    if response_tx.send(response).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("WebSocket closed: session={}, player={}", session_id, viewer);
                    break;
                }
                Some(Err(e)) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
            _ = &mut send_task => break,
        }
    }

    send_task.abort();

    // The session may already be gone; there is nothing left to unsubscribe from.
    let _ = handle.unsubscribe(subscriber_id).await;

    metrics::websocket_disconnected();
    info!(
        "WebSocket disconnected: session={}, player={}",
        session_id, viewer
    );
}

/// Apply a client message and build the response frame.
async fn handle_client_message(
    message: ClientMessage,
    session_id: &SessionId,
    player_id: Option<&PlayerId>,
    state: &AppState,
) -> ServerMessage {
    let intent = match to_intent(message, player_id) {
        Ok(intent) => intent,
        Err(response) => return response,
    };
    let kind = intent.kind();

    match run_intent(state, session_id, intent).await {
        Ok(view) => ServerMessage::Success {
            message: format!("{} accepted", kind),
            view,
        },
        Err(e) => e.into(),
    }
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return Ok(());
        }
    };

    sender.send(Message::Text(json.into())).await?;
    metrics::websocket_messages_sent();
    Ok(())
}
