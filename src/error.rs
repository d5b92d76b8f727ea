use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{presence::BindError, room::RoomCodeError},
};

/// Errors that can occur in service layer operations.
///
/// Display strings are shown verbatim to realtime clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Missing or malformed client input.
    #[error("{0}")]
    InvalidInput(String),
    /// No live room with this code.
    #[error("Room not found.")]
    RoomNotFound(String),
    /// Explicit creation of a code that is already live.
    #[error("Room {0} already exists.")]
    RoomAlreadyExists(String),
    /// Host-only operation attempted by someone else.
    #[error("{0}")]
    Forbidden(String),
    /// A playback update could not be stored.
    #[error("Database update failed, please retry.")]
    PersistenceFailed(#[source] StorageError),
    /// A chat message could not be stored.
    #[error("Failed to send message")]
    MessageSendFailed(#[source] StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<RoomCodeError> for ServiceError {
    fn from(err: RoomCodeError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<BindError> for ServiceError {
    fn from(err: BindError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Caller is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::RoomNotFound(code) => {
                AppError::NotFound(format!("room `{code}` not found"))
            }
            ServiceError::RoomAlreadyExists(code) => {
                AppError::Conflict(format!("room `{code}` already exists"))
            }
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            err @ (ServiceError::PersistenceFailed(_) | ServiceError::MessageSendFailed(_)) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_facing_messages() {
        assert_eq!(
            ServiceError::RoomNotFound("ABC123".into()).to_string(),
            "Room not found."
        );
        let storage = StorageError::Corrupted {
            backend: "memory",
            message: "boom".into(),
        };
        assert_eq!(
            ServiceError::PersistenceFailed(storage).to_string(),
            "Database update failed, please retry."
        );
        assert_eq!(
            ServiceError::from(RoomCodeError::Empty).to_string(),
            "No room ID provided."
        );
    }

    #[test]
    fn http_status_mapping() {
        let cases = [
            (ServiceError::Forbidden("nope".into()), StatusCode::FORBIDDEN),
            (ServiceError::RoomNotFound("X".into()), StatusCode::NOT_FOUND),
            (ServiceError::RoomAlreadyExists("X".into()), StatusCode::CONFLICT),
            (ServiceError::Degraded, StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
