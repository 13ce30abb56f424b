//! Role dealing.

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{constants::SINGLE_MAFIA_THRESHOLD, entities::Role};

/// How many mafia members are dealt for a given player count.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MafiaCountPolicy {
    /// One mafia up to six players, two above that.
    #[default]
    Standard,
    /// One mafia per three players, rounded down (at least one).
    OneInThree,
}

impl MafiaCountPolicy {
    #[must_use]
    pub fn mafia_count(self, player_count: usize) -> usize {
        match self {
            Self::Standard => {
                if player_count <= SINGLE_MAFIA_THRESHOLD {
                    1
                } else {
                    2
                }
            }
            Self::OneInThree => (player_count / 3).max(1),
        }
    }
}

impl fmt::Display for MafiaCountPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Standard => "standard",
            Self::OneInThree => "one_in_three",
        };
        write!(f, "{repr}")
    }
}

/// Deals a shuffled role sequence for a fixed player list.
///
/// The multiset of roles only depends on the player count and the policy.
/// The order is a uniform permutation drawn from the dealer's RNG, so a
/// seeded dealer always deals the same sequence.
#[derive(Debug)]
pub struct RoleDealer {
    policy: MafiaCountPolicy,
    rng: StdRng,
}

impl RoleDealer {
    /// Dealer drawing from an OS-seeded RNG.
    pub fn new() -> Self {
        Self {
            policy: MafiaCountPolicy::default(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic dealer for tests and reproducible games.
    pub fn seeded(seed: u64) -> Self {
        Self {
            policy: MafiaCountPolicy::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: MafiaCountPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MafiaCountPolicy {
        self.policy
    }

    /// Role sequence before shuffling: mafia first, then doctor, detective and
    /// civilians filling the remaining slots.
    ///
    /// `player_count` must leave room for the mafia plus the two specials.
    pub fn lineup(&self, player_count: usize) -> Vec<Role> {
        let mafia_count = self.policy.mafia_count(player_count);
        debug_assert!(mafia_count + 2 <= player_count);

        let mut roles = Vec::with_capacity(player_count);
        roles.extend(std::iter::repeat_n(Role::Mafia, mafia_count));
        roles.push(Role::Doctor);
        roles.push(Role::Detective);
        while roles.len() < player_count {
            roles.push(Role::Civilian);
        }
        roles.truncate(player_count);
        roles
    }

    /// Deal one role per player, positionally.
    pub fn deal(&mut self, player_count: usize) -> Vec<Role> {
        let mut roles = self.lineup(player_count);
        roles.shuffle(&mut self.rng);
        roles
    }
}

impl Default for RoleDealer {
    fn default() -> Self {
        Self::new()
    }
}
