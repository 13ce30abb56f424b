//! Mapping of session errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mafia::GameError;
use serde::Serialize;

/// JSON body returned for every failed request
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Errors returned by gateway handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Game(err) => game_error_status(err),
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Game(err) => game_error_code(err),
            Self::BadRequest(_) => "bad_request",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub fn game_error_status(err: &GameError) -> StatusCode {
    match err {
        GameError::NotFound(_) => StatusCode::NOT_FOUND,
        GameError::AlreadyExists(_)
        | GameError::DuplicatePlayer(_)
        | GameError::WrongPhase { .. }
        | GameError::GameFull { .. } => StatusCode::CONFLICT,
        GameError::InsufficientPlayers { .. }
        | GameError::UnknownPlayer(_)
        | GameError::UnknownTarget(_)
        | GameError::PlayerDead(_)
        | GameError::TargetDead(_)
        | GameError::ActionNotPermitted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        GameError::SessionClosed(_) | GameError::TooManySessions { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Snake-case error code, matching the serialized `error` tag of `GameError`
pub fn game_error_code(err: &GameError) -> &'static str {
    match err {
        GameError::NotFound(_) => "not_found",
        GameError::AlreadyExists(_) => "already_exists",
        GameError::SessionClosed(_) => "session_closed",
        GameError::TooManySessions { .. } => "too_many_sessions",
        GameError::GameFull { .. } => "game_full",
        GameError::DuplicatePlayer(_) => "duplicate_player",
        GameError::InsufficientPlayers { .. } => "insufficient_players",
        GameError::WrongPhase { .. } => "wrong_phase",
        GameError::UnknownPlayer(_) => "unknown_player",
        GameError::PlayerDead(_) => "player_dead",
        GameError::UnknownTarget(_) => "unknown_target",
        GameError::TargetDead(_) => "target_dead",
        GameError::ActionNotPermitted { .. } => "action_not_permitted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mafia::entities::{Phase, PlayerId};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (GameError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (GameError::AlreadyExists("x".to_string()), StatusCode::CONFLICT),
            (GameError::GameFull { max: 8 }, StatusCode::CONFLICT),
            (
                GameError::WrongPhase {
                    expected: Phase::Day,
                    actual: Phase::Night,
                },
                StatusCode::CONFLICT,
            ),
            (
                GameError::InsufficientPlayers {
                    required: 5,
                    actual: 2,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                GameError::TargetDead(PlayerId::new("bob")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                GameError::SessionClosed("x".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_codes_match_serialized_tag() {
        let errors = [
            GameError::NotFound("x".to_string()),
            GameError::TooManySessions { max: 3 },
            GameError::DuplicatePlayer(PlayerId::new("ann")),
            GameError::InsufficientPlayers {
                required: 5,
                actual: 1,
            },
            GameError::ActionNotPermitted {
                player: PlayerId::new("ann"),
                kind: mafia::entities::NightActionKind::Save,
            },
        ];

        for err in errors {
            let json = serde_json::to_value(&err).unwrap();
            assert_eq!(json["error"], game_error_code(&err));
        }
    }

    #[test]
    fn test_gateway_errors() {
        assert_eq!(
            ApiError::BadRequest("nope".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        let err = ApiError::from(GameError::TooManySessions { max: 3 });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "too_many_sessions");
    }
}
