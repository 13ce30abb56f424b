/// Fewest players a session can be started with.
pub const MIN_PLAYERS: usize = 5;

/// Most players a session accepts before reporting it as full.
pub const MAX_PLAYERS: usize = 8;

/// Hard upper bound for configurable rule sets.
pub const PLAYER_LIMIT: usize = 16;

/// Longest accepted player id, in characters.
pub const MAX_PLAYER_ID_LENGTH: usize = 32;

/// Player count at or below which a single mafia member is dealt.
pub const SINGLE_MAFIA_THRESHOLD: usize = 6;
