//! Session actor message types and client intents.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::game::{
    GameError,
    entities::{GameSnapshot, GameView, NightActionKind, Phase, PlayerId, Resolution, SessionSummary},
};

/// Reply to every mutating request: the post-operation snapshot or the
/// reason nothing changed.
pub type SessionResponse = Result<GameSnapshot, GameError>;

/// Messages that can be sent to a SessionActor
#[derive(Debug)]
pub enum SessionMessage {
    /// Add a player to the lobby
    JoinSession {
        player_id: PlayerId,
        response: oneshot::Sender<SessionResponse>,
    },

    /// Deal roles and enter the first night
    StartSession {
        response: oneshot::Sender<SessionResponse>,
    },

    /// Record a night ability
    SubmitNightAction {
        actor_id: PlayerId,
        kind: NightActionKind,
        target_id: PlayerId,
        response: oneshot::Sender<SessionResponse>,
    },

    /// Record a day vote
    SubmitVote {
        voter_id: PlayerId,
        target_id: PlayerId,
        response: oneshot::Sender<SessionResponse>,
    },

    /// Full session state
    GetSnapshot {
        response: oneshot::Sender<GameSnapshot>,
    },

    /// Session state as seen by one player, or by an observer
    GetView {
        player_id: Option<PlayerId>,
        response: oneshot::Sender<GameView>,
    },

    /// Listing entry
    GetSummary {
        response: oneshot::Sender<SessionSummary>,
    },

    /// Subscribe to state change notifications
    Subscribe {
        subscriber_id: Uuid,
        sender: mpsc::Sender<StateChangeNotification>,
    },

    /// Unsubscribe from state change notifications
    Unsubscribe { subscriber_id: Uuid },

    /// Stop the actor
    Close { response: oneshot::Sender<()> },
}

/// Notification sent when session state changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateChangeNotification {
    /// A player joined the lobby
    PlayerJoined { player_id: PlayerId },
    /// Roles were dealt and the first night began
    GameStarted,
    /// A night or day completed; `phase` is the phase the session moved to
    Resolved {
        resolution: Resolution,
        phase: Phase,
    },
    /// The session was torn down
    Closed,
}

/// A client request against one session.
///
/// Intents carry the acting player's id as-is; identity is established by
/// whoever produces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    CreateSession {
        host_id: PlayerId,
    },
    JoinSession {
        player_id: PlayerId,
    },
    StartSession,
    SubmitNightAction {
        actor_id: PlayerId,
        action: NightActionKind,
        target_id: PlayerId,
    },
    SubmitVote {
        voter_id: PlayerId,
        target_id: PlayerId,
    },
}

impl Intent {
    /// Player the intent is issued by, if it names one.
    pub fn player_id(&self) -> Option<&PlayerId> {
        match self {
            Self::CreateSession { host_id } => Some(host_id),
            Self::JoinSession { player_id } => Some(player_id),
            Self::StartSession => None,
            Self::SubmitNightAction { actor_id, .. } => Some(actor_id),
            Self::SubmitVote { voter_id, .. } => Some(voter_id),
        }
    }

    /// Player the intent acts upon, if it names one.
    pub fn target_id(&self) -> Option<&PlayerId> {
        match self {
            Self::SubmitNightAction { target_id, .. } | Self::SubmitVote { target_id, .. } => {
                Some(target_id)
            }
            Self::CreateSession { .. } | Self::JoinSession { .. } | Self::StartSession => None,
        }
    }

    /// Short name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateSession { .. } => "create_session",
            Self::JoinSession { .. } => "join_session",
            Self::StartSession => "start_session",
            Self::SubmitNightAction { .. } => "submit_night_action",
            Self::SubmitVote { .. } => "submit_vote",
        }
    }
}
