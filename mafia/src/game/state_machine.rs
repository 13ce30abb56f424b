//! Mafia session state machine.
//!
//! A [`Game`] owns everything about one session: the players in join order,
//! the current phase, the pending night actions and day votes, and the
//! record of past resolutions. Every operation either applies completely or
//! returns a [`GameError`] without touching the state.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashSet, VecDeque},
    fmt,
};
use thiserror::Error;

use super::constants::{MAX_PLAYERS, MIN_PLAYERS, PLAYER_LIMIT};
use super::entities::{
    ActionSet, GameSnapshot, GameView, Inspection, NightAction, NightActionKind, Phase, Player,
    PlayerId, Resolution, Role, SessionId, SessionSummary, VoteSet, Winner,
};
use super::roles::{MafiaCountPolicy, RoleDealer};

/// Errors returned by session operations. None of them are fatal, and a
/// failed operation leaves the session unchanged.
///
/// `UnknownTarget`, `TargetDead` and `ActionNotPermitted` are deliberate
/// additions to the core rule set: a night action or vote aimed at a
/// missing or dead player, or an ability used by the wrong role, is
/// rejected instead of silently ignored so clients learn why nothing
/// happened. `SessionClosed` and `TooManySessions` come from the session
/// registry rather than the game rules.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
#[serde(tag = "error", content = "detail", rename_all = "snake_case")]
pub enum GameError {
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("session {0} already exists")]
    AlreadyExists(SessionId),
    #[error("session {0} is closed")]
    SessionClosed(SessionId),
    #[error("session limit reached ({max} sessions)")]
    TooManySessions { max: usize },
    #[error("game is full ({max} players)")]
    GameFull { max: usize },
    #[error("player {0} already joined")]
    DuplicatePlayer(PlayerId),
    #[error("need at least {required} players, have {actual}")]
    InsufficientPlayers { required: usize, actual: usize },
    #[error("not allowed during {actual} (expected {expected})")]
    WrongPhase { expected: Phase, actual: Phase },
    #[error("player {0} is not in this game")]
    UnknownPlayer(PlayerId),
    #[error("player {0} is dead")]
    PlayerDead(PlayerId),
    #[error("target {0} is not in this game")]
    UnknownTarget(PlayerId),
    #[error("target {0} is already dead")]
    TargetDead(PlayerId),
    #[error("player {player} can't {kind} tonight")]
    ActionNotPermitted {
        player: PlayerId,
        kind: NightActionKind,
    },
}

/// Things that happened in a session, drained by the owner for logging.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum GameEvent {
    PlayerJoined(PlayerId),
    GameStarted { players: usize, mafia: usize },
    PlayerKilled(PlayerId),
    KillPrevented(PlayerId),
    QuietNight,
    PlayerExecuted { player: PlayerId, votes: usize },
    GameEnded(Winner),
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::PlayerJoined(player) => format!("{player} joined the game"),
            Self::GameStarted { players, mafia } => {
                format!("game started with {players} players ({mafia} mafia)")
            }
            Self::PlayerKilled(player) => format!("{player} was killed during the night"),
            Self::KillPrevented(player) => format!("{player} was attacked but saved"),
            Self::QuietNight => "nobody died tonight".to_string(),
            Self::PlayerExecuted { player, votes } => {
                format!("{player} was executed with {votes} votes")
            }
            Self::GameEnded(winner) => format!("{winner} won the game"),
        };
        write!(f, "{repr}")
    }
}

/// When the mafia is considered to have taken over the town.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WinThreshold {
    /// Mafia win once they are at least as many as everyone else.
    #[default]
    Parity,
    /// Mafia win only once they outnumber everyone else.
    Majority,
}

impl WinThreshold {
    #[must_use]
    pub const fn mafia_wins(self, alive_mafia: usize, alive_others: usize) -> bool {
        match self {
            Self::Parity => alive_mafia >= alive_others,
            Self::Majority => alive_mafia > alive_others,
        }
    }
}

impl fmt::Display for WinThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Parity => "parity",
            Self::Majority => "majority",
        };
        write!(f, "{repr}")
    }
}

/// Rule set a session is played with.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct GameRules {
    pub min_players: usize,
    pub max_players: usize,
    pub mafia_policy: MafiaCountPolicy,
    pub win_threshold: WinThreshold,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            min_players: MIN_PLAYERS,
            max_players: MAX_PLAYERS,
            mafia_policy: MafiaCountPolicy::Standard,
            win_threshold: WinThreshold::Parity,
        }
    }
}

impl GameRules {
    /// Validate the rule set
    pub fn validate(&self) -> Result<(), String> {
        if self.min_players < 4 {
            return Err("Min players must be at least 4".to_string());
        }

        if self.max_players < self.min_players {
            return Err("Max players must be at least min players".to_string());
        }

        if self.max_players > PLAYER_LIMIT {
            return Err(format!("Max players must be at most {PLAYER_LIMIT}"));
        }

        Ok(())
    }
}

/// One Mafia session.
#[derive(Debug)]
pub struct Game {
    id: SessionId,
    host_id: PlayerId,
    /// Join order is preserved and breaks vote ties.
    players: Vec<Player>,
    phase: Phase,
    round: u32,
    actions: ActionSet,
    votes: VoteSet,
    winner: Option<Winner>,
    history: Vec<Resolution>,
    inspections: Vec<Inspection>,
    rules: GameRules,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: VecDeque<GameEvent>,
    dealer: RoleDealer,
}

impl Game {
    /// Create a session in the `waiting` phase with the host as its first player.
    pub fn new(id: SessionId, host_id: PlayerId, rules: GameRules, dealer: RoleDealer) -> Self {
        let now = Utc::now();
        let mut game = Self {
            id,
            host_id: host_id.clone(),
            players: Vec::with_capacity(rules.max_players),
            phase: Phase::Waiting,
            round: 0,
            actions: ActionSet::default(),
            votes: VoteSet::new(),
            winner: None,
            history: Vec::new(),
            inspections: Vec::new(),
            rules,
            created_at: now,
            updated_at: now,
            events: VecDeque::new(),
            dealer: dealer.with_policy(rules.mafia_policy),
        };
        game.players.push(Player::new(host_id.clone()));
        game.events.push_back(GameEvent::PlayerJoined(host_id));
        game
    }

    /// Rebuild a game from an exported snapshot. Pending events are not part
    /// of a snapshot and start out empty.
    pub fn from_snapshot(snapshot: GameSnapshot, dealer: RoleDealer) -> Self {
        Self {
            id: snapshot.id,
            host_id: snapshot.host_id,
            players: snapshot.players,
            phase: snapshot.phase,
            round: snapshot.round,
            actions: snapshot.actions,
            votes: snapshot.votes,
            winner: snapshot.winner,
            history: snapshot.history,
            inspections: snapshot.inspections,
            rules: snapshot.rules,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            events: VecDeque::new(),
            dealer: dealer.with_policy(snapshot.rules.mafia_policy),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn host_id(&self) -> &PlayerId {
        &self.host_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn actions(&self) -> &ActionSet {
        &self.actions
    }

    pub fn votes(&self) -> &VoteSet {
        &self.votes
    }

    pub fn history(&self) -> &[Resolution] {
        &self.history
    }

    pub fn drain_events(&mut self) -> VecDeque<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Full state of the session.
    #[must_use]
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            id: self.id.clone(),
            host_id: self.host_id.clone(),
            players: self.players.clone(),
            phase: self.phase,
            round: self.round,
            actions: self.actions.clone(),
            votes: self.votes.clone(),
            winner: self.winner,
            history: self.history.clone(),
            inspections: self.inspections.clone(),
            rules: self.rules,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            host_id: self.host_id.clone(),
            player_count: self.players.len(),
            max_players: self.rules.max_players,
            phase: self.phase,
            winner: self.winner,
        }
    }

    /// Add a player. Only allowed while waiting for the game to start.
    pub fn join(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        self.expect_phase(Phase::Waiting)?;
        if self.players.len() >= self.rules.max_players {
            return Err(GameError::GameFull {
                max: self.rules.max_players,
            });
        }
        if self.position(&player_id).is_some() {
            return Err(GameError::DuplicatePlayer(player_id));
        }

        self.players.push(Player::new(player_id.clone()));
        self.events.push_back(GameEvent::PlayerJoined(player_id));
        self.touch();
        Ok(())
    }

    /// Deal roles over the current player list and enter the first night.
    pub fn start(&mut self) -> Result<(), GameError> {
        self.expect_phase(Phase::Waiting)?;
        if self.players.len() < self.rules.min_players {
            return Err(GameError::InsufficientPlayers {
                required: self.rules.min_players,
                actual: self.players.len(),
            });
        }

        let roles = self.dealer.deal(self.players.len());
        for (player, role) in self.players.iter_mut().zip(roles) {
            player.role = Some(role);
        }

        self.actions.clear();
        self.votes.clear();
        self.phase = Phase::Night;
        self.round = 1;
        self.events.push_back(GameEvent::GameStarted {
            players: self.players.len(),
            mafia: self.players.iter().filter(|p| p.is_mafia()).count(),
        });
        self.touch();
        Ok(())
    }

    /// Record a night action. Resolves the night once every living player
    /// with a night ability has acted, returning the outcome.
    pub fn submit_night_action(
        &mut self,
        actor_id: PlayerId,
        kind: NightActionKind,
        target_id: PlayerId,
    ) -> Result<Option<Resolution>, GameError> {
        self.expect_phase(Phase::Night)?;
        let actor = self.living_player(&actor_id)?;
        if actor.role.and_then(Role::night_ability) != Some(kind) {
            return Err(GameError::ActionNotPermitted {
                player: actor_id,
                kind,
            });
        }
        self.living_target(&target_id)?;

        let replaced = self.actions.record(NightAction {
            actor_id: actor_id.clone(),
            kind,
            target_id,
        });
        if replaced {
            debug!("Session {}: {} changed their night action", self.id, actor_id);
        }
        self.touch();

        if self.night_complete() {
            Ok(Some(self.resolve_night()))
        } else {
            Ok(None)
        }
    }

    /// Record a day vote. Resolves the day once every living player voted.
    pub fn submit_vote(
        &mut self,
        voter_id: PlayerId,
        target_id: PlayerId,
    ) -> Result<Option<Resolution>, GameError> {
        self.expect_phase(Phase::Day)?;
        self.living_player(&voter_id)?;
        self.living_target(&target_id)?;

        self.votes.insert(voter_id, target_id);
        self.touch();

        if self.day_complete() {
            Ok(Some(self.resolve_day()))
        } else {
            Ok(None)
        }
    }

    /// Players that still owe a night action.
    pub fn pending_actors(&self) -> Vec<&PlayerId> {
        self.players
            .iter()
            .filter(|p| p.alive && p.has_night_ability() && !self.actions.contains(&p.id))
            .map(|p| &p.id)
            .collect()
    }

    /// Number of night actions needed to resolve the current night.
    pub fn required_actions(&self) -> usize {
        self.players
            .iter()
            .filter(|p| p.alive && p.has_night_ability())
            .count()
    }

    fn night_complete(&self) -> bool {
        self.pending_actors().is_empty()
    }

    fn day_complete(&self) -> bool {
        self.players
            .iter()
            .filter(|p| p.alive)
            .all(|p| self.votes.contains_key(&p.id))
    }

    /// Saves cancel every attack on their target. Of the attacks left, the
    /// first one submitted is carried out.
    fn resolve_night(&mut self) -> Resolution {
        let saved: HashSet<&PlayerId> = self
            .actions
            .of_kind(NightActionKind::Save)
            .map(|a| &a.target_id)
            .collect();

        let prevented = self
            .actions
            .of_kind(NightActionKind::Eliminate)
            .find(|a| saved.contains(&a.target_id))
            .map(|a| a.target_id.clone());
        let kill = self
            .actions
            .of_kind(NightActionKind::Eliminate)
            .find(|a| !saved.contains(&a.target_id))
            .map(|a| a.target_id.clone());

        let inspections: Vec<Inspection> = self
            .actions
            .of_kind(NightActionKind::Inspect)
            .map(|a| Inspection {
                round: self.round,
                detective_id: a.actor_id.clone(),
                target_id: a.target_id.clone(),
                is_mafia: self
                    .players
                    .iter()
                    .find(|p| p.id == a.target_id)
                    .is_some_and(Player::is_mafia),
            })
            .collect();
        self.inspections.extend(inspections);

        let killed = kill.and_then(|target| self.eliminate(&target).then_some(target));

        if let Some(player) = &prevented {
            self.events.push_back(GameEvent::KillPrevented(player.clone()));
        }
        match &killed {
            Some(player) => self.events.push_back(GameEvent::PlayerKilled(player.clone())),
            None => self.events.push_back(GameEvent::QuietNight),
        }

        let resolution = Resolution::Night {
            round: self.round,
            killed,
            saved: prevented,
        };
        self.history.push(resolution.clone());
        self.actions.clear();
        self.phase = Phase::Day;
        self.check_win();
        resolution
    }

    /// The most voted target is executed. Ties go to whoever joined first.
    fn resolve_day(&mut self) -> Resolution {
        let tally: Vec<(PlayerId, usize)> = self
            .players
            .iter()
            .map(|p| (p.id.clone(), self.votes.values().filter(|t| **t == p.id).count()))
            .filter(|(_, votes)| *votes > 0)
            .collect();

        // Strict comparison keeps the earliest joiner among equal tallies.
        let mut leader: Option<&(PlayerId, usize)> = None;
        for entry in &tally {
            if leader.is_none_or(|(_, best)| entry.1 > *best) {
                leader = Some(entry);
            }
        }
        let leader = leader.cloned();

        let executed = leader.and_then(|(target, votes)| {
            self.eliminate(&target).then(|| {
                self.events.push_back(GameEvent::PlayerExecuted {
                    player: target.clone(),
                    votes,
                });
                target
            })
        });

        let resolution = Resolution::Day {
            round: self.round,
            executed,
            tally,
        };
        self.history.push(resolution.clone());
        self.votes.clear();
        self.phase = Phase::Night;
        self.round += 1;
        self.check_win();
        resolution
    }

    fn check_win(&mut self) {
        let alive_mafia = self.players.iter().filter(|p| p.alive && p.is_mafia()).count();
        let alive_others = self
            .players
            .iter()
            .filter(|p| p.alive && !p.is_mafia())
            .count();

        let winner = if alive_mafia == 0 {
            Some(Winner::Civilians)
        } else if self.rules.win_threshold.mafia_wins(alive_mafia, alive_others) {
            Some(Winner::Mafia)
        } else {
            None
        };

        if let Some(winner) = winner {
            self.phase = Phase::Ended;
            self.winner = Some(winner);
            self.actions.clear();
            self.votes.clear();
            self.events.push_back(GameEvent::GameEnded(winner));
        }
    }

    /// Mark a living player dead. Returns false if there was nobody to kill.
    fn eliminate(&mut self, target: &PlayerId) -> bool {
        match self.players.iter_mut().find(|p| &p.id == target) {
            Some(player) if player.alive => {
                player.alive = false;
                true
            }
            _ => false,
        }
    }

    /// Session state as seen by `viewer`, or by an outside observer if `None`.
    #[must_use]
    pub fn view_for(&self, viewer: Option<&PlayerId>) -> GameView {
        self.snapshot().view_for(viewer)
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), GameError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(GameError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    fn position(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    fn living_player(&self, id: &PlayerId) -> Result<&Player, GameError> {
        match self.players.iter().find(|p| &p.id == id) {
            None => Err(GameError::UnknownPlayer(id.clone())),
            Some(p) if !p.alive => Err(GameError::PlayerDead(id.clone())),
            Some(p) => Ok(p),
        }
    }

    fn living_target(&self, id: &PlayerId) -> Result<(), GameError> {
        match self.players.iter().find(|p| &p.id == id) {
            None => Err(GameError::UnknownTarget(id.clone())),
            Some(p) if !p.alive => Err(GameError::TargetDead(id.clone())),
            Some(_) => Ok(()),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PlayerId {
        PlayerId::new(s)
    }

    fn lobby(n: usize) -> Game {
        let mut game = Game::new(
            "room".to_string(),
            pid("p1"),
            GameRules::default(),
            RoleDealer::seeded(3),
        );
        for i in 2..=n {
            game.join(pid(&format!("p{i}"))).unwrap();
        }
        game
    }

    /// Game in its first night with roles fixed by position.
    fn rigged(roles: &[Role]) -> Game {
        let mut game = lobby(roles.len());
        game.start().unwrap();
        for (player, role) in game.players.iter_mut().zip(roles) {
            player.role = Some(*role);
        }
        game
    }

    const FIVE: [Role; 5] = [
        Role::Mafia,
        Role::Doctor,
        Role::Detective,
        Role::Civilian,
        Role::Civilian,
    ];

    fn alive(game: &Game, id: &str) -> bool {
        game.players.iter().find(|p| p.id.as_str() == id).unwrap().alive
    }

    #[test]
    fn test_host_is_first_player() {
        let game = lobby(1);
        assert_eq!(game.players().len(), 1);
        assert_eq!(game.players()[0].id, pid("p1"));
        assert_eq!(game.phase(), Phase::Waiting);
    }

    #[test]
    fn test_join_rejects_duplicates_and_full_games() {
        let mut game = lobby(8);

        let err = game.join(pid("p9")).unwrap_err();
        assert_eq!(err, GameError::GameFull { max: 8 });
        assert_eq!(game.players().len(), 8);

        let mut game = lobby(3);
        let err = game.join(pid("p2")).unwrap_err();
        assert_eq!(err, GameError::DuplicatePlayer(pid("p2")));
        assert_eq!(game.players().len(), 3);
    }

    #[test]
    fn test_start_requires_min_players() {
        let mut game = lobby(4);
        let err = game.start().unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientPlayers {
                required: 5,
                actual: 4
            }
        );
        assert_eq!(game.phase(), Phase::Waiting);
        assert!(game.players().iter().all(|p| p.role.is_none()));
    }

    #[test]
    fn test_start_deals_roles_and_enters_night() {
        let mut game = lobby(7);
        game.start().unwrap();

        assert_eq!(game.phase(), Phase::Night);
        assert_eq!(game.round(), 1);
        assert!(game.players().iter().all(|p| p.role.is_some()));
        let mafia = game.players().iter().filter(|p| p.is_mafia()).count();
        assert_eq!(mafia, 2);

        assert!(matches!(
            game.start(),
            Err(GameError::WrongPhase {
                expected: Phase::Waiting,
                actual: Phase::Night
            })
        ));
        assert!(matches!(
            game.join(pid("late")),
            Err(GameError::WrongPhase { .. })
        ));
    }

    #[test]
    fn test_night_action_validation() {
        let mut game = rigged(&FIVE);

        assert_eq!(
            game.submit_night_action(pid("ghost"), NightActionKind::Eliminate, pid("p4")),
            Err(GameError::UnknownPlayer(pid("ghost")))
        );
        assert_eq!(
            game.submit_night_action(pid("p4"), NightActionKind::Eliminate, pid("p5")),
            Err(GameError::ActionNotPermitted {
                player: pid("p4"),
                kind: NightActionKind::Eliminate
            })
        );
        assert_eq!(
            game.submit_night_action(pid("p2"), NightActionKind::Eliminate, pid("p5")),
            Err(GameError::ActionNotPermitted {
                player: pid("p2"),
                kind: NightActionKind::Eliminate
            })
        );
        assert_eq!(
            game.submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("nobody")),
            Err(GameError::UnknownTarget(pid("nobody")))
        );
        assert!(game.actions().is_empty());
    }

    #[test]
    fn test_night_waits_for_every_ability() {
        let mut game = rigged(&FIVE);
        let r = game
            .submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("p4"))
            .unwrap();
        assert!(r.is_none());
        let r = game
            .submit_night_action(pid("p2"), NightActionKind::Save, pid("p2"))
            .unwrap();
        assert!(r.is_none());
        assert_eq!(game.pending_actors(), vec![&pid("p3")]);
        assert_eq!(game.phase(), Phase::Night);
    }

    #[test]
    fn test_save_prevents_kill() {
        let mut game = rigged(&FIVE);
        game.submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("p4"))
            .unwrap();
        game.submit_night_action(pid("p2"), NightActionKind::Save, pid("p4"))
            .unwrap();
        let resolution = game
            .submit_night_action(pid("p3"), NightActionKind::Inspect, pid("p1"))
            .unwrap()
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::Night {
                round: 1,
                killed: None,
                saved: Some(pid("p4"))
            }
        );
        assert!(alive(&game, "p4"));
        assert_eq!(game.phase(), Phase::Day);
        assert!(game.actions().is_empty());
        assert_eq!(game.inspections.len(), 1);
        assert!(game.inspections[0].is_mafia);
    }

    #[test]
    fn test_unsaved_kill_lands() {
        let mut game = rigged(&FIVE);
        game.submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("p4"))
            .unwrap();
        game.submit_night_action(pid("p2"), NightActionKind::Save, pid("p5"))
            .unwrap();
        let resolution = game
            .submit_night_action(pid("p3"), NightActionKind::Inspect, pid("p5"))
            .unwrap()
            .unwrap();

        assert_eq!(resolution.eliminated(), Some(&pid("p4")));
        assert!(!alive(&game, "p4"));
        assert_eq!(game.phase(), Phase::Day);
        assert!(!game.inspections[0].is_mafia);
    }

    #[test]
    fn test_first_submitted_kill_wins() {
        let roles = [
            Role::Mafia,
            Role::Mafia,
            Role::Doctor,
            Role::Detective,
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
        ];
        let mut game = rigged(&roles);
        game.submit_night_action(pid("p2"), NightActionKind::Eliminate, pid("p6"))
            .unwrap();
        game.submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("p5"))
            .unwrap();
        // Changing a target keeps the original submission slot.
        game.submit_night_action(pid("p2"), NightActionKind::Eliminate, pid("p7"))
            .unwrap();
        game.submit_night_action(pid("p3"), NightActionKind::Save, pid("p3"))
            .unwrap();
        game.submit_night_action(pid("p4"), NightActionKind::Inspect, pid("p1"))
            .unwrap();

        let killed: Vec<_> = game
            .players()
            .iter()
            .filter(|p| !p.alive)
            .map(|p| p.id.clone())
            .collect();
        assert_eq!(killed, vec![pid("p7")]);
    }

    #[test]
    fn test_saved_target_skips_to_next_attack() {
        let roles = [
            Role::Mafia,
            Role::Mafia,
            Role::Doctor,
            Role::Detective,
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
        ];
        let mut game = rigged(&roles);
        game.submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("p5"))
            .unwrap();
        game.submit_night_action(pid("p2"), NightActionKind::Eliminate, pid("p6"))
            .unwrap();
        game.submit_night_action(pid("p3"), NightActionKind::Save, pid("p5"))
            .unwrap();
        let resolution = game
            .submit_night_action(pid("p4"), NightActionKind::Inspect, pid("p2"))
            .unwrap()
            .unwrap();

        assert_eq!(
            resolution,
            Resolution::Night {
                round: 1,
                killed: Some(pid("p6")),
                saved: Some(pid("p5"))
            }
        );
    }

    fn to_day(game: &mut Game) {
        game.submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("p4"))
            .unwrap();
        game.submit_night_action(pid("p2"), NightActionKind::Save, pid("p4"))
            .unwrap();
        game.submit_night_action(pid("p3"), NightActionKind::Inspect, pid("p5"))
            .unwrap();
        assert_eq!(game.phase(), Phase::Day);
    }

    #[test]
    fn test_plurality_vote_executes() {
        let mut game = rigged(&FIVE);
        to_day(&mut game);

        for voter in ["p1", "p2", "p3"] {
            assert!(game.submit_vote(pid(voter), pid("p5")).unwrap().is_none());
        }
        game.submit_vote(pid("p4"), pid("p1")).unwrap();
        let resolution = game.submit_vote(pid("p5"), pid("p1")).unwrap().unwrap();

        assert_eq!(resolution.eliminated(), Some(&pid("p5")));
        assert!(!alive(&game, "p5"));
        assert_eq!(game.phase(), Phase::Night);
        assert_eq!(game.round(), 2);
        assert!(game.votes().is_empty());
    }

    #[test]
    fn test_tied_vote_goes_to_earliest_joiner() {
        let mut game = rigged(&FIVE);
        to_day(&mut game);

        // p5 and p4 tie on two votes each; p4 joined first.
        game.submit_vote(pid("p1"), pid("p5")).unwrap();
        game.submit_vote(pid("p2"), pid("p5")).unwrap();
        game.submit_vote(pid("p3"), pid("p4")).unwrap();
        game.submit_vote(pid("p5"), pid("p4")).unwrap();
        let resolution = game.submit_vote(pid("p4"), pid("p2")).unwrap().unwrap();

        assert_eq!(resolution.eliminated(), Some(&pid("p4")));
        assert!(alive(&game, "p5"));
    }

    #[test]
    fn test_revote_overwrites() {
        let mut game = rigged(&FIVE);
        to_day(&mut game);

        game.submit_vote(pid("p1"), pid("p4")).unwrap();
        game.submit_vote(pid("p1"), pid("p5")).unwrap();
        assert_eq!(game.votes().len(), 1);
        assert_eq!(game.votes().get(&pid("p1")), Some(&pid("p5")));
    }

    #[test]
    fn test_executing_mafia_ends_game() {
        let mut game = rigged(&FIVE);
        to_day(&mut game);

        for voter in ["p1", "p2", "p3", "p4", "p5"] {
            game.submit_vote(pid(voter), pid("p1")).unwrap();
        }

        assert_eq!(game.phase(), Phase::Ended);
        assert_eq!(game.winner(), Some(Winner::Civilians));
        assert!(matches!(
            game.submit_vote(pid("p2"), pid("p3")),
            Err(GameError::WrongPhase {
                actual: Phase::Ended,
                ..
            })
        ));
    }

    #[test]
    fn test_mafia_parity_ends_game() {
        let mut game = rigged(&FIVE);
        // Night 1: civilian p4 dies.
        game.submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("p4"))
            .unwrap();
        game.submit_night_action(pid("p2"), NightActionKind::Save, pid("p2"))
            .unwrap();
        game.submit_night_action(pid("p3"), NightActionKind::Inspect, pid("p5"))
            .unwrap();
        assert_eq!(game.phase(), Phase::Day);

        // Day 1: civilian p5 executed, leaving 1 mafia against 2.
        for voter in ["p1", "p2", "p3", "p5"] {
            game.submit_vote(pid(voter), pid("p5")).unwrap();
        }
        assert_eq!(game.phase(), Phase::Night);

        // Night 2: doctor p2 dies, 1 mafia against 1.
        game.submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("p2"))
            .unwrap();
        game.submit_night_action(pid("p2"), NightActionKind::Save, pid("p3"))
            .unwrap();
        game.submit_night_action(pid("p3"), NightActionKind::Inspect, pid("p1"))
            .unwrap();

        assert_eq!(game.phase(), Phase::Ended);
        assert_eq!(game.winner(), Some(Winner::Mafia));
    }

    #[test]
    fn test_majority_threshold_keeps_game_going_at_parity() {
        let rules = GameRules {
            win_threshold: WinThreshold::Majority,
            ..GameRules::default()
        };
        assert!(!rules.win_threshold.mafia_wins(1, 1));
        assert!(rules.win_threshold.mafia_wins(2, 1));
        assert!(WinThreshold::Parity.mafia_wins(1, 1));
    }

    #[test]
    fn test_dead_players_cannot_act_or_be_targeted() {
        let mut game = rigged(&FIVE);
        game.submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("p3"))
            .unwrap();
        game.submit_night_action(pid("p2"), NightActionKind::Save, pid("p2"))
            .unwrap();
        game.submit_night_action(pid("p3"), NightActionKind::Inspect, pid("p4"))
            .unwrap();
        assert!(!alive(&game, "p3"));

        assert_eq!(
            game.submit_vote(pid("p3"), pid("p1")),
            Err(GameError::PlayerDead(pid("p3")))
        );
        assert_eq!(
            game.submit_vote(pid("p1"), pid("p3")),
            Err(GameError::TargetDead(pid("p3")))
        );

        // Only four living voters are needed now.
        for voter in ["p1", "p2", "p4"] {
            game.submit_vote(pid(voter), pid("p5")).unwrap();
        }
        assert!(game.submit_vote(pid("p5"), pid("p1")).unwrap().is_some());

        // The dead detective is no longer a required actor.
        assert_eq!(game.required_actions(), 2);
    }

    #[test]
    fn test_view_masks_roles() {
        let roles = [
            Role::Mafia,
            Role::Mafia,
            Role::Doctor,
            Role::Detective,
            Role::Civilian,
            Role::Civilian,
            Role::Civilian,
        ];
        let game = rigged(&roles);

        let mafia_view = game.view_for(Some(&pid("p1")));
        assert_eq!(mafia_view.players[0].role, Some(Role::Mafia));
        assert_eq!(mafia_view.players[1].role, Some(Role::Mafia));
        assert_eq!(mafia_view.players[2].role, None);

        let doctor_view = game.view_for(Some(&pid("p3")));
        assert_eq!(doctor_view.players[2].role, Some(Role::Doctor));
        assert_eq!(doctor_view.players[0].role, None);
        assert_eq!(doctor_view.actions_required, 4);

        let observer = game.view_for(None);
        assert!(observer.players.iter().all(|p| p.role.is_none()));
        assert!(observer.viewer.is_none());
    }

    #[test]
    fn test_snapshot_round_trip_preserves_state() {
        let mut game = rigged(&FIVE);
        game.submit_night_action(pid("p1"), NightActionKind::Eliminate, pid("p4"))
            .unwrap();

        let json = serde_json::to_string(&game.snapshot()).unwrap();
        let snapshot: GameSnapshot = serde_json::from_str(&json).unwrap();
        let mut restored = Game::from_snapshot(snapshot, RoleDealer::seeded(0));

        assert_eq!(restored.snapshot(), game.snapshot());
        restored
            .submit_night_action(pid("p2"), NightActionKind::Save, pid("p5"))
            .unwrap();
        restored
            .submit_night_action(pid("p3"), NightActionKind::Inspect, pid("p5"))
            .unwrap();
        assert!(!alive(&restored, "p4"));
    }

    #[test]
    fn test_rules_validation() {
        assert!(GameRules::default().validate().is_ok());
        let rules = GameRules {
            min_players: 6,
            max_players: 5,
            ..GameRules::default()
        };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_events_are_drained() {
        let mut game = lobby(5);
        game.start().unwrap();
        let events = game.drain_events();
        assert_eq!(events.len(), 6);
        assert!(matches!(
            events.back(),
            Some(GameEvent::GameStarted { players: 5, .. })
        ));
        assert!(game.drain_events().is_empty());
    }
}
