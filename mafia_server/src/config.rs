//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use mafia::{
    GameRules, MafiaCountPolicy, SessionConfig, WinThreshold,
    session::config::DEFAULT_INBOX_CAPACITY,
};
use std::net::SocketAddr;

/// Default HTTP/WebSocket bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:6969";

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Prometheus scrape endpoint, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Configuration applied to every session
    pub session: SessionConfig,
    /// Gateway limits
    pub limits: GatewayLimits,
}

/// Limits enforced by the gateway rather than the game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayLimits {
    /// Maximum number of concurrently registered sessions
    pub max_sessions: usize,
    /// Buffered notifications per WebSocket connection
    pub notification_buffer: usize,
}

impl Default for GatewayLimits {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            notification_buffer: 32,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `metrics_bind_override` - Optional metrics address override (from CLI args)
    ///
    /// # Returns
    ///
    /// * `Result<ServerConfig, ConfigError>` - Loaded configuration or error
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        metrics_bind_override: Option<SocketAddr>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr_env("SERVER_BIND")?.unwrap_or(default_bind()),
        };

        let metrics_bind = match metrics_bind_override {
            Some(bind) => Some(bind),
            None => parse_addr_env("METRICS_BIND")?,
        };

        let defaults = GameRules::default();
        let rules = GameRules {
            min_players: parse_env_or("MIN_PLAYERS", defaults.min_players)?,
            max_players: parse_env_or("MAX_PLAYERS", defaults.max_players)?,
            mafia_policy: match std::env::var("MAFIA_POLICY") {
                Ok(v) => parse_mafia_policy(&v)?,
                Err(_) => defaults.mafia_policy,
            },
            win_threshold: match std::env::var("WIN_THRESHOLD") {
                Ok(v) => parse_win_threshold(&v)?,
                Err(_) => defaults.win_threshold,
            },
        };

        let session = SessionConfig {
            rules,
            inbox_capacity: parse_env_or("SESSION_INBOX_CAPACITY", DEFAULT_INBOX_CAPACITY)?,
        };

        let default_limits = GatewayLimits::default();
        let limits = GatewayLimits {
            max_sessions: parse_env_or("MAX_SESSIONS", default_limits.max_sessions)?,
            notification_buffer: parse_env_or(
                "WS_NOTIFICATION_BUFFER",
                default_limits.notification_buffer,
            )?,
        };

        Ok(ServerConfig {
            bind,
            metrics_bind,
            session,
            limits,
        })
    }

    /// Validate configuration after loading
    ///
    /// # Returns
    ///
    /// * `Result<(), ConfigError>` - Success or validation error
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rules = &self.session.rules;

        if rules.min_players < 4 {
            return Err(ConfigError::Invalid {
                var: "MIN_PLAYERS".to_string(),
                reason: "Must be at least 4 (mafia, doctor, detective and one civilian)"
                    .to_string(),
            });
        }

        if rules.max_players < rules.min_players {
            return Err(ConfigError::Invalid {
                var: "MAX_PLAYERS".to_string(),
                reason: format!("Must be at least MIN_PLAYERS ({})", rules.min_players),
            });
        }

        if let Err(reason) = self.session.validate() {
            return Err(ConfigError::Invalid {
                var: "SESSION".to_string(),
                reason,
            });
        }

        if self.limits.max_sessions == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_SESSIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.limits.notification_buffer == 0 {
            return Err(ConfigError::Invalid {
                var: "WS_NOTIFICATION_BUFFER".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Must differ from SERVER_BIND ({})", self.bind),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Malformed environment variable {var}: {value:?}\nHint: {hint}")]
    Malformed {
        var: String,
        value: String,
        hint: String,
    },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6969))
}

/// Parse an optional address variable, failing on malformed values
fn parse_addr_env(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v.parse().map(Some).map_err(|_| ConfigError::Malformed {
            var: key.to_string(),
            value: v,
            hint: "Expected an IP:PORT address, e.g. 0.0.0.0:8080".to_string(),
        }),
        Err(_) => Ok(None),
    }
}

/// Parse a numeric variable, using `default` only when it is unset
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    parse_value_or(key, std::env::var(key).ok(), default)
}

fn parse_value_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match value {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Malformed {
            var: key.to_string(),
            value: v,
            hint: "Expected a non-negative integer".to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_mafia_policy(value: &str) -> Result<MafiaCountPolicy, ConfigError> {
    match value.to_lowercase().as_str() {
        "standard" => Ok(MafiaCountPolicy::Standard),
        "one_in_three" => Ok(MafiaCountPolicy::OneInThree),
        _ => Err(ConfigError::Malformed {
            var: "MAFIA_POLICY".to_string(),
            value: value.to_string(),
            hint: "Use standard or one_in_three".to_string(),
        }),
    }
}

fn parse_win_threshold(value: &str) -> Result<WinThreshold, ConfigError> {
    match value.to_lowercase().as_str() {
        "parity" => Ok(WinThreshold::Parity),
        "majority" => Ok(WinThreshold::Majority),
        _ => Err(ConfigError::Malformed {
            var: "WIN_THRESHOLD".to_string(),
            value: value.to_string(),
            hint: "Use parity or majority".to_string(),
        }),
    }
}
