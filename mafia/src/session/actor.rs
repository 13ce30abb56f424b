//! Session actor implementation with async message handling.

use super::messages::{SessionMessage, SessionResponse, StateChangeNotification};
use crate::game::{
    Game, GameError,
    entities::{
        GameSnapshot, GameView, NightActionKind, PlayerId, Resolution, SessionId, SessionSummary,
    },
};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Session actor handle for sending messages
#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    session_id: SessionId,
}

impl SessionHandle {
    /// Create a new session handle
    pub fn new(sender: mpsc::Sender<SessionMessage>, session_id: SessionId) -> Self {
        Self { sender, session_id }
    }

    /// Get session ID
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Whether the actor behind this handle has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a message to the session
    pub async fn send(&self, message: SessionMessage) -> Result<(), GameError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| GameError::SessionClosed(self.session_id.clone()))
    }

    /// Send a request and wait for the actor's reply
    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T, GameError> {
        let (tx, rx) = oneshot::channel();
        self.send(message(tx)).await?;
        rx.await
            .map_err(|_| GameError::SessionClosed(self.session_id.clone()))
    }

    pub async fn join(&self, player_id: PlayerId) -> SessionResponse {
        self.request(|response| SessionMessage::JoinSession {
            player_id,
            response,
        })
        .await?
    }

    pub async fn start(&self) -> SessionResponse {
        self.request(|response| SessionMessage::StartSession { response })
            .await?
    }

    pub async fn submit_night_action(
        &self,
        actor_id: PlayerId,
        kind: NightActionKind,
        target_id: PlayerId,
    ) -> SessionResponse {
        self.request(|response| SessionMessage::SubmitNightAction {
            actor_id,
            kind,
            target_id,
            response,
        })
        .await?
    }

    pub async fn submit_vote(&self, voter_id: PlayerId, target_id: PlayerId) -> SessionResponse {
        self.request(|response| SessionMessage::SubmitVote {
            voter_id,
            target_id,
            response,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<GameSnapshot, GameError> {
        self.request(|response| SessionMessage::GetSnapshot { response })
            .await
    }

    pub async fn view(&self, player_id: Option<PlayerId>) -> Result<GameView, GameError> {
        self.request(|response| SessionMessage::GetView {
            player_id,
            response,
        })
        .await
    }

    pub async fn summary(&self) -> Result<SessionSummary, GameError> {
        self.request(|response| SessionMessage::GetSummary { response })
            .await
    }

    /// Subscribe to state change notifications
    ///
    /// # Arguments
    ///
    /// * `subscriber_id` - Key used to unsubscribe later
    /// * `sender` - Channel notifications are pushed into
    pub async fn subscribe(
        &self,
        subscriber_id: Uuid,
        sender: mpsc::Sender<StateChangeNotification>,
    ) -> Result<(), GameError> {
        self.send(SessionMessage::Subscribe {
            subscriber_id,
            sender,
        })
        .await
    }

    pub async fn unsubscribe(&self, subscriber_id: Uuid) -> Result<(), GameError> {
        self.send(SessionMessage::Unsubscribe { subscriber_id })
            .await
    }

    /// Stop the actor. Subscribers receive a final `Closed` notification.
    pub async fn close(&self) -> Result<(), GameError> {
        self.request(|response| SessionMessage::Close { response })
            .await
    }
}

/// Session actor owning a single game
///
/// Every operation on the game goes through the actor's inbox, so requests
/// against one session are applied one at a time in arrival order while
/// other sessions run on their own tasks.
pub struct SessionActor {
    /// Game state
    game: Game,

    /// Message inbox
    inbox: mpsc::Receiver<SessionMessage>,

    /// Is session closed
    is_closed: bool,

    /// Subscribers for state change notifications
    subscribers: HashMap<Uuid, mpsc::Sender<StateChangeNotification>>,
}

impl SessionActor {
    /// Create a new session actor
    ///
    /// # Arguments
    ///
    /// * `game` - Game the actor takes ownership of
    /// * `inbox_capacity` - Number of requests that can queue up
    ///
    /// # Returns
    ///
    /// * `(SessionActor, SessionHandle)` - Actor and handle for sending messages
    pub fn new(game: Game, inbox_capacity: usize) -> (Self, SessionHandle) {
        let (sender, inbox) = mpsc::channel(inbox_capacity.max(1));
        let handle = SessionHandle::new(sender, game.id().clone());

        let actor = Self {
            game,
            inbox,
            is_closed: false,
            subscribers: HashMap::new(),
        };

        (actor, handle)
    }

    /// Run the session actor event loop
    pub async fn run(mut self) {
        log::info!(
            "Session {} starting (host {})",
            self.game.id(),
            self.game.host_id()
        );
        self.flush_events();

        while let Some(message) = self.inbox.recv().await {
            self.handle_message(message);

            if self.is_closed {
                break;
            }
        }

        self.notify_state_change(StateChangeNotification::Closed);
        log::info!("Session {} closed", self.game.id());
    }

    /// Handle a session message
    fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::JoinSession {
                player_id,
                response,
            } => {
                let result = self.handle_join(player_id);
                let _ = response.send(result);
            }

            SessionMessage::StartSession { response } => {
                let result = self.handle_start();
                let _ = response.send(result);
            }

            SessionMessage::SubmitNightAction {
                actor_id,
                kind,
                target_id,
                response,
            } => {
                let result = self
                    .game
                    .submit_night_action(actor_id, kind, target_id)
                    .map(|resolution| self.after_submission(resolution));
                let _ = response.send(result);
            }

            SessionMessage::SubmitVote {
                voter_id,
                target_id,
                response,
            } => {
                let result = self
                    .game
                    .submit_vote(voter_id, target_id)
                    .map(|resolution| self.after_submission(resolution));
                let _ = response.send(result);
            }

            SessionMessage::GetSnapshot { response } => {
                let _ = response.send(self.game.snapshot());
            }

            SessionMessage::GetView {
                player_id,
                response,
            } => {
                let _ = response.send(self.game.view_for(player_id.as_ref()));
            }

            SessionMessage::GetSummary { response } => {
                let _ = response.send(self.game.summary());
            }

            SessionMessage::Subscribe {
                subscriber_id,
                sender,
            } => {
                self.subscribers.insert(subscriber_id, sender);
                log::debug!(
                    "Subscriber {} subscribed to session {} state changes",
                    subscriber_id,
                    self.game.id()
                );
            }

            SessionMessage::Unsubscribe { subscriber_id } => {
                self.subscribers.remove(&subscriber_id);
                log::debug!(
                    "Subscriber {} unsubscribed from session {} state changes",
                    subscriber_id,
                    self.game.id()
                );
            }

            SessionMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(());
            }
        }
    }

    fn handle_join(&mut self, player_id: PlayerId) -> SessionResponse {
        self.game.join(player_id.clone())?;
        self.flush_events();
        self.notify_state_change(StateChangeNotification::PlayerJoined { player_id });
        Ok(self.game.snapshot())
    }

    fn handle_start(&mut self) -> SessionResponse {
        self.game.start()?;
        self.flush_events();
        self.notify_state_change(StateChangeNotification::GameStarted);
        Ok(self.game.snapshot())
    }

    /// Unresolved submissions are not broadcast; only completed resolutions are.
    fn after_submission(&mut self, resolution: Option<Resolution>) -> GameSnapshot {
        self.flush_events();
        if let Some(resolution) = resolution {
            let phase = self.game.phase();
            self.notify_state_change(StateChangeNotification::Resolved { resolution, phase });
        }
        self.game.snapshot()
    }

    fn flush_events(&mut self) {
        for event in self.game.drain_events() {
            log::info!("Session {}: {}", self.game.id(), event);
        }
    }

    /// Broadcast state change notification to all subscribers
    fn notify_state_change(&mut self, notification: StateChangeNotification) {
        self.subscribers.retain(|subscriber_id, sender| {
            match sender.try_send(notification.clone()) {
                Ok(_) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!(
                        "Subscriber {} channel full, dropping notification",
                        subscriber_id
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("Subscriber {} disconnected, removing", subscriber_id);
                    false
                }
            }
        });
    }
}
