use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::{collections::BTreeMap, fmt};

use super::constants;

/// Identifier of a session. Supplied by the caller or generated.
pub type SessionId = String;

/// Identifier of a player, unique within a session.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PlayerId(String);

impl PlayerId {
    /// Trims the input and replaces inner whitespace with `_`. Length is
    /// not enforced here; see [`PlayerId::is_valid`].
    pub fn new(s: &str) -> Self {
        let id: String = s
            .trim()
            .chars()
            .map(|c| if c.is_ascii_whitespace() { '_' } else { c })
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty and at most [`constants::MAX_PLAYER_ID_LENGTH`] characters.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.chars().count() <= constants::MAX_PLAYER_ID_LENGTH
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Hidden role dealt to each player when the game starts.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Mafia,
    Doctor,
    Detective,
    Civilian,
}

impl Role {
    /// The night ability this role may use, if any.
    #[must_use]
    pub const fn night_ability(self) -> Option<NightActionKind> {
        match self {
            Self::Mafia => Some(NightActionKind::Eliminate),
            Self::Doctor => Some(NightActionKind::Save),
            Self::Detective => Some(NightActionKind::Inspect),
            Self::Civilian => None,
        }
    }

    #[must_use]
    pub const fn is_mafia(self) -> bool {
        matches!(self, Self::Mafia)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Mafia => "mafia",
            Self::Doctor => "doctor",
            Self::Detective => "detective",
            Self::Civilian => "civilian",
        };
        write!(f, "{repr}")
    }
}

/// Stage of the day/night cycle.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Waiting,
    Night,
    Day,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Night => "night",
            Self::Day => "day",
            Self::Ended => "ended",
        };
        write!(f, "{repr}")
    }
}

/// Faction that won the game.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Mafia,
    Civilians,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Mafia => "mafia",
            Self::Civilians => "civilians",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NightActionKind {
    Eliminate,
    Save,
    Inspect,
}

impl fmt::Display for NightActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Eliminate => "eliminate",
            Self::Save => "save",
            Self::Inspect => "inspect",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub alive: bool,
    pub role: Option<Role>,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            alive: true,
            role: None,
        }
    }

    #[must_use]
    pub fn has_night_ability(&self) -> bool {
        self.role.and_then(Role::night_ability).is_some()
    }

    #[must_use]
    pub fn is_mafia(&self) -> bool {
        self.role.is_some_and(Role::is_mafia)
    }
}

/// A night action recorded for one actor.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct NightAction {
    pub actor_id: PlayerId,
    pub kind: NightActionKind,
    pub target_id: PlayerId,
}

/// Night actions in submission order, at most one per actor.
///
/// Resubmitting replaces the actor's action but keeps its original slot, so
/// the order only reflects each actor's first submission of the night.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ActionSet(Vec<NightAction>);

impl ActionSet {
    /// Record an action. Returns true if it replaced an earlier one.
    pub fn record(&mut self, action: NightAction) -> bool {
        match self.0.iter_mut().find(|a| a.actor_id == action.actor_id) {
            Some(existing) => {
                *existing = action;
                true
            }
            None => {
                self.0.push(action);
                false
            }
        }
    }

    #[must_use]
    pub fn get(&self, actor_id: &PlayerId) -> Option<&NightAction> {
        self.0.iter().find(|a| &a.actor_id == actor_id)
    }

    #[must_use]
    pub fn contains(&self, actor_id: &PlayerId) -> bool {
        self.get(actor_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NightAction> {
        self.0.iter()
    }

    pub fn of_kind(&self, kind: NightActionKind) -> impl Iterator<Item = &NightAction> {
        self.0.iter().filter(move |a| a.kind == kind)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Day votes keyed by voter. Last write wins.
pub type VoteSet = BTreeMap<PlayerId, PlayerId>;

/// Result of a detective's inspection.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Inspection {
    pub round: u32,
    pub detective_id: PlayerId,
    pub target_id: PlayerId,
    pub is_mafia: bool,
}

/// Outcome of a completed resolution, kept in the session history.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum Resolution {
    Night {
        round: u32,
        /// Player eliminated during the night.
        killed: Option<PlayerId>,
        /// Player who was attacked but protected.
        saved: Option<PlayerId>,
    },
    Day {
        round: u32,
        executed: Option<PlayerId>,
        /// Vote count per target, in join order of the targets.
        tally: Vec<(PlayerId, usize)>,
    },
}

impl Resolution {
    /// Player removed from play by this resolution.
    #[must_use]
    pub fn eliminated(&self) -> Option<&PlayerId> {
        match self {
            Self::Night { killed, .. } => killed.as_ref(),
            Self::Day { executed, .. } => executed.as_ref(),
        }
    }
}

/// Complete, serializable state of one session.
///
/// This is the value exported to an external document store and the value
/// a game can be rebuilt from at startup.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameSnapshot {
    pub id: SessionId,
    pub host_id: PlayerId,
    pub players: Vec<Player>,
    pub phase: Phase,
    pub round: u32,
    pub actions: ActionSet,
    pub votes: VoteSet,
    pub winner: Option<Winner>,
    pub history: Vec<Resolution>,
    pub inspections: Vec<Inspection>,
    pub rules: super::GameRules,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameSnapshot {
    #[must_use]
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    /// Ids of players holding the given role, in join order.
    pub fn players_with_role(&self, role: Role) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.role == Some(role))
            .map(|p| p.id.clone())
            .collect()
    }

    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    /// Session state as seen by `viewer`, or by an outside observer if `None`.
    ///
    /// Roles stay hidden except the viewer's own, fellow mafia for mafia
    /// viewers, and everybody's once the game ended. Vote targets other than
    /// the viewer's own are reduced to who has voted.
    #[must_use]
    pub fn view_for(&self, viewer: Option<&PlayerId>) -> GameView {
        let me = viewer.and_then(|id| self.players.iter().find(|p| &p.id == id));
        let viewer_is_mafia = me.is_some_and(Player::is_mafia);
        let reveal_all = self.phase == Phase::Ended;

        let players = self
            .players
            .iter()
            .map(|p| {
                let visible = reveal_all
                    || me.is_some_and(|m| m.id == p.id)
                    || (viewer_is_mafia && p.is_mafia());
                PlayerView {
                    id: p.id.clone(),
                    alive: p.alive,
                    role: if visible { p.role } else { None },
                }
            })
            .collect();

        let night_actions = self
            .actions
            .iter()
            .filter(|a| {
                me.is_some_and(|m| m.id == a.actor_id)
                    || (viewer_is_mafia && a.kind == NightActionKind::Eliminate)
            })
            .cloned()
            .collect();

        let inspections = self
            .inspections
            .iter()
            .filter(|i| reveal_all || me.is_some_and(|m| m.id == i.detective_id))
            .cloned()
            .collect();

        GameView {
            id: self.id.clone(),
            host_id: self.host_id.clone(),
            viewer: me.map(|m| m.id.clone()),
            phase: self.phase,
            round: self.round,
            players,
            night_actions,
            actions_submitted: self.actions.len(),
            actions_required: if self.phase == Phase::Night {
                self.players
                    .iter()
                    .filter(|p| p.alive && p.has_night_ability())
                    .count()
            } else {
                0
            },
            voted: self
                .players
                .iter()
                .filter(|p| self.votes.contains_key(&p.id))
                .map(|p| p.id.clone())
                .collect(),
            own_vote: me.and_then(|m| self.votes.get(&m.id).cloned()),
            inspections,
            history: self.history.clone(),
            winner: self.winner,
        }
    }
}

/// A player as seen by one viewer. The role is hidden unless the viewer is
/// entitled to see it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub alive: bool,
    pub role: Option<Role>,
}

/// Session state as seen by one participant (or an anonymous observer).
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameView {
    pub id: SessionId,
    pub host_id: PlayerId,
    pub viewer: Option<PlayerId>,
    pub phase: Phase,
    pub round: u32,
    pub players: Vec<PlayerView>,
    /// Night actions visible to the viewer: their own, plus every
    /// `eliminate` action when the viewer is mafia.
    pub night_actions: Vec<NightAction>,
    pub actions_submitted: usize,
    pub actions_required: usize,
    /// Players who have voted today, in join order.
    pub voted: Vec<PlayerId>,
    pub own_vote: Option<PlayerId>,
    pub inspections: Vec<Inspection>,
    pub history: Vec<Resolution>,
    pub winner: Option<Winner>,
}

/// Short description of a session for listings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub host_id: PlayerId,
    pub player_count: usize,
    pub max_players: usize,
    pub phase: Phase,
    pub winner: Option<Winner>,
}
