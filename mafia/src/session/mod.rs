//! Session module providing multi-session support with an async actor model.
//!
//! This module implements:
//! - SessionActor: Async actor owning a single game
//! - SessionManager: Registry spawning and tearing down session actors
//! - Message-based communication with tokio channels
//! - Client intents and state change notifications
//!
//! ## Architecture
//!
//! Each session runs in a separate Tokio task with an mpsc message inbox.
//! The task is the only owner of its `Game`, so operations on one session
//! are linearized while different sessions proceed in parallel. The
//! SessionManager maps session ids to handles and never runs game logic.
//!
//! ## Example
//!
//! ```
//! use mafia::{Intent, SessionConfig, SessionManager, entities::PlayerId};
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let manager = SessionManager::new(SessionConfig::default());
//! let snapshot = manager
//!     .create(Some("lobby".to_string()), PlayerId::new("alice"))
//!     .await
//!     .unwrap();
//! assert_eq!(snapshot.players.len(), 1);
//!
//! let intent = Intent::JoinSession { player_id: PlayerId::new("bob") };
//! let snapshot = manager.apply("lobby", intent).await.unwrap();
//! assert_eq!(snapshot.players.len(), 2);
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod manager;
pub mod messages;

pub use actor::{SessionActor, SessionHandle};
pub use config::SessionConfig;
pub use manager::{DealerFactory, SessionManager};
pub use messages::{Intent, SessionMessage, SessionResponse, StateChangeNotification};
