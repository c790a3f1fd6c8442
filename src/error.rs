use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::transitions::TransitionError};

/// Failures surfaced by the session services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The store answered with an error.
    #[error("session store failure")]
    Unavailable(#[source] StorageError),
    /// No store is installed.
    #[error("session store unavailable (degraded mode)")]
    Degraded,
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Not allowed in the session's current status.
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// Room full, or no free room code left.
    #[error("capacity exceeded: {0}")]
    Capacity(String),
    /// Every compare-and-swap attempt lost to a concurrent writer.
    #[error("room `{room}` is busy after {attempts} attempt(s); retry the operation")]
    Contention {
        /// Contended room.
        room: String,
        /// Attempts made.
        attempts: u32,
    },
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        Self::Unavailable(err)
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        let message = err.to_string();
        match err {
            TransitionError::InvalidInput(reason) => Self::InvalidInput(reason),
            TransitionError::Unauthorized => Self::Unauthorized(message),
            TransitionError::RoomFull { .. } => Self::Capacity(message),
            TransitionError::PlayerNotFound(_) | TransitionError::SegmentNotFound(_) => {
                Self::NotFound(message)
            }
            TransitionError::InvalidTransition(_)
            | TransitionError::NotEnoughPlayers { .. }
            | TransitionError::SessionEnded => Self::InvalidState(message),
        }
    }
}

/// HTTP-facing error; each variant fixes the status code of the response.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Degraded, failing or contended store; clients may retry.
    #[error("{0}")]
    ServiceUnavailable(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::ServiceUnavailable(_) => "unavailable",
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        Self::BadRequest(format!("validation failed: {err}"))
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::InvalidInput(_) => Self::BadRequest(message),
            ServiceError::Unauthorized(_) => Self::Unauthorized(message),
            ServiceError::NotFound(_) => Self::NotFound(message),
            ServiceError::InvalidState(_) | ServiceError::Capacity(_) => Self::Conflict(message),
            ServiceError::Unavailable(source) => {
                Self::ServiceUnavailable(format!("{message}: {source}"))
            }
            ServiceError::Degraded | ServiceError::Contention { .. } => {
                Self::ServiceUnavailable(message)
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_errors_map_to_http_statuses() {
        let cases = [
            (TransitionError::RoomFull { max: 10 }, StatusCode::CONFLICT),
            (TransitionError::PlayerNotFound("p".into()), StatusCode::NOT_FOUND),
            (TransitionError::InvalidInput("nope".into()), StatusCode::BAD_REQUEST),
            (TransitionError::Unauthorized, StatusCode::UNAUTHORIZED),
            (TransitionError::NotEnoughPlayers { active: 1 }, StatusCode::CONFLICT),
            (TransitionError::SessionEnded, StatusCode::CONFLICT),
        ];
        for (error, status) in cases {
            let response = AppError::from(ServiceError::from(error)).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn store_trouble_is_retryable() {
        let contention = ServiceError::Contention {
            room: "ABC234".into(),
            attempts: 5,
        };
        for error in [contention, ServiceError::Degraded] {
            let app = AppError::from(error);
            assert_eq!(app.kind(), "unavailable");
            assert_eq!(app.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }
}
