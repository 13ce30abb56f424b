//! # Mafia
//!
//! Session engine for the Mafia (Werewolf) social deduction party game.
//!
//! The library tracks a room's players, deals hidden roles, advances the
//! day/night cycle, collects simultaneous night actions and day votes,
//! resolves them, and decides when one faction has won.
//!
//! ## Phases
//!
//! - **Waiting**: players join the lobby
//! - **Night**: mafia, doctor and detective submit their abilities
//! - **Day**: every living player votes someone out
//! - **Ended**: one faction won, nothing else is accepted
//!
//! ## Core Modules
//!
//! - [`game`]: Entities, role dealer and the session state machine
//! - [`session`]: Per-session actors and the session registry
//!
//! ## Example
//!
//! ```
//! use mafia::{Game, GameRules, entities::PlayerId, roles::RoleDealer};
//!
//! let mut game = Game::new(
//!     "lobby".to_string(),
//!     PlayerId::new("alice"),
//!     GameRules::default(),
//!     RoleDealer::new(),
//! );
//! game.join(PlayerId::new("bob")).unwrap();
//! assert_eq!(game.players().len(), 2);
//! ```

/// Core game logic, entities, and state machine.
pub mod game;
pub use game::{
    Game, GameError, GameEvent, GameRules, WinThreshold,
    constants::{self, MAX_PLAYERS, MIN_PLAYERS},
    entities::{self, GameSnapshot, GameView, PlayerId, SessionId},
    roles::{self, MafiaCountPolicy, RoleDealer},
};

/// Session actors, registry and client intents.
pub mod session;
pub use session::{
    Intent, SessionActor, SessionConfig, SessionHandle, SessionManager,
    StateChangeNotification,
};
