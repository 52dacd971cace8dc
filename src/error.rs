use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::store::StoreError;

/// Errors surfaced by room and session operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    /// Empty or malformed input
    #[error("{0}")]
    Validation(String),

    /// Player name already taken in the room
    #[error("{0}")]
    Conflict(String),

    /// Action attempted in the wrong phase, by the wrong player, or too early
    #[error("{0}")]
    Precondition(String),

    /// Room was deleted or never existed
    #[error("{0}")]
    NotFound(String),

    /// Second description for the same round
    #[error("{0}")]
    DuplicateSubmission(String),

    /// The room store or change feed failed
    #[error("Room store unavailable: {0}")]
    StoreUnavailable(String),
}

impl GameError {
    /// Stable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            GameError::Validation(_) => "VALIDATION_ERROR",
            GameError::Conflict(_) => "CONFLICT",
            GameError::Precondition(_) => "PRECONDITION_FAILED",
            GameError::NotFound(_) => "NOT_FOUND",
            GameError::DuplicateSubmission(_) => "DUPLICATE_SUBMISSION",
            GameError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GameError::Validation(_) => StatusCode::BAD_REQUEST,
            GameError::Conflict(_) | GameError::DuplicateSubmission(_) => StatusCode::CONFLICT,
            GameError::Precondition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => GameError::NotFound(format!("Room {} not found", id)),
            StoreError::AlreadyExists(id) => {
                GameError::Conflict(format!("Room {} already exists", id))
            }
            other => GameError::StoreUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "code": self.code(),
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
