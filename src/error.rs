use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::selection::SelectionError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend rejected or failed the request.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// The store is unreachable, so no write is attempted.
    #[error("offline: changes cannot be saved until the connection is back")]
    Offline,
    /// Another write is still being saved.
    #[error("another change is still being saved")]
    Busy,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// The document changed between read and write.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A record could not be turned into store fields.
    #[error("failed to encode document")]
    Encoding(#[from] serde_json::Error),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            err @ StorageError::Conflict { .. } => ServiceError::Conflict(err.to_string()),
            err @ StorageError::NotFound { .. } => ServiceError::NotFound(err.to_string()),
            err @ StorageError::Unavailable { .. } => ServiceError::Unavailable(err),
        }
    }
}

impl From<SelectionError> for ServiceError {
    fn from(err: SelectionError) -> Self {
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
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or offline.
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
            err @ ServiceError::Offline => AppError::ServiceUnavailable(err.to_string()),
            err @ ServiceError::Busy => AppError::Conflict(err.to_string()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::Encoding(source) => AppError::Internal(source.to_string()),
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
    use crate::dao::collection_store::{Collection, DocumentId};

    #[test]
    fn storage_errors_map_to_http_statuses() {
        let conflict: AppError = ServiceError::from(StorageError::Conflict {
            collection: Collection::Restaurants,
            id: DocumentId::from("r1"),
        })
        .into();
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let missing: AppError = ServiceError::from(StorageError::NotFound {
            collection: Collection::Members,
            id: DocumentId::from("m1"),
        })
        .into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let offline: AppError = ServiceError::Offline.into();
        assert_eq!(
            offline.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn selection_guard_is_a_bad_request() {
        let err: AppError = ServiceError::from(SelectionError::NotEnoughMembers {
            required: 2,
            actual: 1,
        })
        .into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
