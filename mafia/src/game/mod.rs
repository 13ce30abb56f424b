//! Mafia game engine - session state machine and role dealing.
//!
//! This module holds everything that decides the outcome of a game:
//! - Entities (players, roles, phases, pending actions and votes)
//! - The role dealer
//! - The state machine driving joins, night actions, votes and resolutions
//! - Per-player views with hidden roles masked

pub mod constants;
pub mod entities;
pub mod roles;

mod state_machine;

pub use state_machine::*;
