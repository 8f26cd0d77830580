use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, player::error::PlayerError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Player lookup or device command failed.
    #[error(transparent)]
    Player(#[from] PlayerError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
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
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Player(err) => err.into(),
        }
    }
}

impl From<PlayerError> for AppError {
    fn from(err: PlayerError) -> Self {
        let message = err.to_string();
        match err {
            PlayerError::UnknownPlayer { .. } | PlayerError::UnknownAction { .. } => {
                AppError::NotFound(message)
            }
            PlayerError::MissingIdentity { .. }
            | PlayerError::MissingValue { .. }
            | PlayerError::InvalidValue { .. }
            | PlayerError::MissingDuration => AppError::BadRequest(message),
            PlayerError::NoAddress { .. } => AppError::Conflict(message),
            PlayerError::Device(_) => AppError::ServiceUnavailable(message),
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
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
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
    use crate::player::{actions::ActionMode, error::DeviceError};

    fn status(err: impl Into<AppError>) -> StatusCode {
        let err: AppError = err.into();
        err.into_response().status()
    }

    #[test]
    fn player_errors_map_to_statuses() {
        assert_eq!(
            status(PlayerError::UnknownPlayer {
                device_id: "abc".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(PlayerError::UnknownAction {
                mode: ActionMode::Navigation,
                action: "dance".into()
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(PlayerError::MissingDuration), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(PlayerError::NoAddress {
                device_id: "abc".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(PlayerError::Device(DeviceError::Timeout {
                url: "http://10.0.0.9:32500".into()
            })),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn service_errors_keep_their_meaning() {
        assert_eq!(
            status(ServiceError::InvalidInput("nope".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ServiceError::Player(PlayerError::MissingValue {
                action: "volume".into()
            })),
            StatusCode::BAD_REQUEST
        );
    }
}
