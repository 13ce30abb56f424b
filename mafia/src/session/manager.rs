//! Session manager for spawning and managing multiple session actors.

use super::{
    actor::{SessionActor, SessionHandle},
    config::SessionConfig,
    messages::{Intent, SessionResponse},
};
use crate::game::{
    Game, GameError,
    entities::{GameSnapshot, PlayerId, SessionId, SessionSummary},
    roles::RoleDealer,
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Builds the role dealer handed to each new session.
pub type DealerFactory = Arc<dyn Fn() -> RoleDealer + Send + Sync>;

/// Session manager owning every live session of the process
///
/// The map lock is only held to look up, insert or remove a handle. All game
/// work happens on the session's own actor task.
#[derive(Clone)]
pub struct SessionManager {
    /// Configuration applied to new sessions
    config: SessionConfig,

    /// Active session handles
    sessions: Arc<RwLock<HashMap<SessionId, SessionHandle>>>,

    /// Source of role dealers for new sessions
    dealer_factory: DealerFactory,

    /// Cap on concurrently registered sessions, unbounded when `None`
    max_sessions: Option<usize>,

    /// Sessions created since startup
    created: Arc<AtomicU64>,
}

impl SessionManager {
    /// Create a new session manager dealing roles from OS randomness
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration for every session this manager spawns
    ///
    /// # Returns
    ///
    /// * `SessionManager` - New session manager instance
    pub fn new(config: SessionConfig) -> Self {
        Self::with_dealer_factory(config, Arc::new(RoleDealer::new))
    }

    /// Create a session manager with a custom role dealer source
    ///
    /// Tests pass a factory producing seeded dealers to get reproducible role
    /// assignments.
    pub fn with_dealer_factory(config: SessionConfig, dealer_factory: DealerFactory) -> Self {
        Self {
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            dealer_factory,
            max_sessions: None,
            created: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Refuse new sessions with `TooManySessions` once `max` are registered
    #[must_use]
    pub fn with_session_limit(mut self, max: usize) -> Self {
        self.max_sessions = Some(max);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a session and spawn its actor
    ///
    /// # Arguments
    ///
    /// * `session_id` - Requested id; a UUID is generated when absent or blank
    /// * `host_id` - Player hosting the session, added as the first player
    ///
    /// # Returns
    ///
    /// * `Result<GameSnapshot, GameError>` - Snapshot of the new session,
    ///   `AlreadyExists` if the id is taken, or `TooManySessions` at the limit
    pub async fn create(
        &self,
        session_id: Option<SessionId>,
        host_id: PlayerId,
    ) -> Result<GameSnapshot, GameError> {
        let session_id = session_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let game = Game::new(
            session_id,
            host_id,
            self.config.rules,
            (self.dealer_factory)(),
        );
        let snapshot = game.snapshot();
        self.spawn(game).await?;
        self.created.fetch_add(1, Ordering::Relaxed);

        log::info!("Created and spawned session {}", snapshot.id);

        Ok(snapshot)
    }

    /// Adopt an existing game, e.g. one rebuilt from a persisted snapshot
    pub async fn insert(&self, game: Game) -> Result<(), GameError> {
        let session_id = game.id().clone();
        self.spawn(game).await?;

        log::info!("Adopted session {}", session_id);

        Ok(())
    }

    /// Rebuild a session from an exported snapshot and adopt it
    pub async fn restore(&self, snapshot: GameSnapshot) -> Result<(), GameError> {
        self.insert(Game::from_snapshot(snapshot, (self.dealer_factory)()))
            .await
    }

    /// Spawn an actor for `game` unless its id is already registered or the
    /// session limit is reached. Both checks run under the write lock.
    async fn spawn(&self, game: Game) -> Result<(), GameError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(game.id()) {
            return Err(GameError::AlreadyExists(game.id().clone()));
        }
        if let Some(max) = self.max_sessions
            && sessions.len() >= max
        {
            return Err(GameError::TooManySessions { max });
        }

        let (actor, handle) = SessionActor::new(game, self.config.inbox_capacity);
        sessions.insert(handle.session_id().clone(), handle);
        drop(sessions);

        tokio::spawn(actor.run());

        Ok(())
    }

    /// Get a session handle
    ///
    /// # Returns
    ///
    /// * `Result<SessionHandle, GameError>` - Handle, or `NotFound`
    pub async fn get(&self, session_id: &str) -> Result<SessionHandle, GameError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| GameError::NotFound(session_id.to_string()))
    }

    /// Tear a session down
    ///
    /// The id is forgotten immediately; later lookups return `NotFound`.
    pub async fn remove(&self, session_id: &str) -> Result<(), GameError> {
        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .remove(session_id)
            .ok_or_else(|| GameError::NotFound(session_id.to_string()))?;
        drop(sessions);

        // An actor that already stopped has nothing left to close.
        if let Err(e) = handle.close().await {
            log::debug!("Session {} was already stopped: {}", session_id, e);
        }

        log::info!("Closed session {}", session_id);

        Ok(())
    }

    /// List all active sessions, ordered by id
    pub async fn list(&self) -> Vec<SessionSummary> {
        let handles: Vec<SessionHandle> = {
            let sessions = self.sessions.read().await;
            sessions.values().cloned().collect()
        };

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.summary().await {
                Ok(summary) => summaries.push(summary),
                Err(e) => log::debug!("Skipping session {}: {}", handle.session_id(), e),
            }
        }
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    /// Apply a client intent to a session
    ///
    /// # Arguments
    ///
    /// * `session_id` - Target session (the id to create for `CreateSession`)
    /// * `intent` - What the client asked for
    ///
    /// # Returns
    ///
    /// * `Result<GameSnapshot, GameError>` - Post-operation snapshot, or the
    ///   domain error that left the session untouched
    pub async fn apply(&self, session_id: &str, intent: Intent) -> SessionResponse {
        log::debug!("Session {}: applying {}", session_id, intent.kind());

        match intent {
            Intent::CreateSession { host_id } => {
                self.create(Some(session_id.to_string()), host_id).await
            }
            Intent::JoinSession { player_id } => self.get(session_id).await?.join(player_id).await,
            Intent::StartSession => self.get(session_id).await?.start().await,
            Intent::SubmitNightAction {
                actor_id,
                action,
                target_id,
            } => {
                self.get(session_id)
                    .await?
                    .submit_night_action(actor_id, action, target_id)
                    .await
            }
            Intent::SubmitVote {
                voter_id,
                target_id,
            } => {
                self.get(session_id)
                    .await?
                    .submit_vote(voter_id, target_id)
                    .await
            }
        }
    }

    /// Number of sessions currently registered
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of sessions created since startup
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Close every session and empty the registry
    pub async fn shutdown(&self) {
        let handles: Vec<SessionHandle> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, handle)| handle).collect()
        };

        let count = handles.len();
        for handle in handles {
            let _ = handle.close().await;
        }

        log::info!("Session manager shut down ({} sessions closed)", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Phase;

    fn manager() -> SessionManager {
        SessionManager::with_dealer_factory(
            SessionConfig::default(),
            Arc::new(|| RoleDealer::seeded(5)),
        )
    }

    #[tokio::test]
    async fn test_create_adds_host() {
        let manager = manager();
        let snapshot = manager
            .create(Some("room".to_string()), PlayerId::new("host"))
            .await
            .unwrap();

        assert_eq!(snapshot.id, "room");
        assert_eq!(snapshot.players.len(), 1);
        assert_eq!(snapshot.players[0].id, PlayerId::new("host"));
        assert_eq!(snapshot.phase, Phase::Waiting);
        assert_eq!(manager.session_count().await, 1);
        assert_eq!(manager.created_count(), 1);
    }

    #[tokio::test]
    async fn test_create_generates_id() {
        let manager = manager();
        let a = manager.create(None, PlayerId::new("a")).await.unwrap();
        let b = manager
            .create(Some("  ".to_string()), PlayerId::new("b"))
            .await
            .unwrap();

        assert!(Uuid::parse_str(&a.id).is_ok());
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let manager = manager();
        manager
            .create(Some("room".to_string()), PlayerId::new("a"))
            .await
            .unwrap();
        let err = manager
            .create(Some("room".to_string()), PlayerId::new("b"))
            .await
            .unwrap_err();

        assert_eq!(err, GameError::AlreadyExists("room".to_string()));
        assert_eq!(manager.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_remove_then_not_found() {
        let manager = manager();
        manager
            .create(Some("room".to_string()), PlayerId::new("a"))
            .await
            .unwrap();

        manager.remove("room").await.unwrap();
        assert!(matches!(manager.get("room").await, Err(GameError::NotFound(_))));
        assert_eq!(
            manager.remove("room").await,
            Err(GameError::NotFound("room".to_string()))
        );
    }

    #[tokio::test]
    async fn test_list_sorted_by_id() {
        let manager = manager();
        for id in ["charlie", "alpha", "bravo"] {
            manager
                .create(Some(id.to_string()), PlayerId::new("host"))
                .await
                .unwrap();
        }

        let ids: Vec<_> = manager.list().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["alpha", "bravo", "charlie"]);
    }

    #[tokio::test]
    async fn test_apply_routes_intents() {
        let manager = manager();
        manager
            .apply(
                "room",
                Intent::CreateSession {
                    host_id: PlayerId::new("p1"),
                },
            )
            .await
            .unwrap();

        let snapshot = manager
            .apply(
                "room",
                Intent::JoinSession {
                    player_id: PlayerId::new("p2"),
                },
            )
            .await
            .unwrap();
        assert_eq!(snapshot.players.len(), 2);

        let err = manager
            .apply("missing", Intent::StartSession)
            .await
            .unwrap_err();
        assert_eq!(err, GameError::NotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_shutdown_empties_registry() {
        let manager = manager();
        let snapshot = manager.create(None, PlayerId::new("a")).await.unwrap();
        let handle = manager.get(&snapshot.id).await.unwrap();

        manager.shutdown().await;
        assert_eq!(manager.session_count().await, 0);
        assert!(handle.snapshot().await.is_err());
    }

    #[tokio::test]
    async fn test_session_limit() {
        let manager = manager().with_session_limit(1);
        manager
            .create(Some("one".to_string()), PlayerId::new("a"))
            .await
            .unwrap();

        let err = manager
            .create(Some("two".to_string()), PlayerId::new("b"))
            .await
            .unwrap_err();
        assert_eq!(err, GameError::TooManySessions { max: 1 });

        // A taken id still reports the conflict rather than the limit
        let err = manager
            .create(Some("one".to_string()), PlayerId::new("c"))
            .await
            .unwrap_err();
        assert_eq!(err, GameError::AlreadyExists("one".to_string()));

        manager.remove("one").await.unwrap();
        manager
            .create(Some("two".to_string()), PlayerId::new("b"))
            .await
            .unwrap();
        assert_eq!(manager.created_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_session_limit_under_concurrent_creates() {
        let manager = manager().with_session_limit(3);

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager
                        .create(Some(format!("room-{i}")), PlayerId::new("host"))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) => assert_eq!(e, GameError::TooManySessions { max: 3 }),
            }
        }

        assert_eq!(created, 3);
        assert_eq!(manager.session_count().await, 3);
    }
}
