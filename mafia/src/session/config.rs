//! Session configuration models.

use serde::{Deserialize, Serialize};

use crate::game::GameRules;

/// Default number of queued requests per session actor.
pub const DEFAULT_INBOX_CAPACITY: usize = 100;

/// Configuration shared by every session a manager spawns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Rule set new sessions are played with
    pub rules: GameRules,

    /// Capacity of each session actor's message inbox
    pub inbox_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rules: GameRules::default(),
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.rules.validate()?;

        if self.inbox_capacity == 0 {
            return Err("Inbox capacity must be at least 1".to_string());
        }

        Ok(())
    }
}
