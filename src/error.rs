//! Application error taxonomy and its HTTP mapping.
//!
//! Services return these directly; routes only add the 404 arm, which is
//! represented as `Option::None` below this layer rather than as an error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

// ---

#[derive(Debug, Error)]
pub enum AppError {
    /// A reading referenced a device that is not registered.
    #[error("Device with ID {0} not found")]
    UnknownDevice(String),

    /// The external device identifier is already registered (unique
    /// constraint violation surfaced by the store).
    #[error("Device with ID {0} already exists")]
    DuplicateDeviceId(String),

    /// A status string outside Online/Offline/Error.
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let status = match &self {
            AppError::UnknownDevice(_)
            | AppError::DuplicateDeviceId(_)
            | AppError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            AppError::Database(e) => {
                tracing::error!("request failed: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self {
            // Never leak driver details to clients.
            AppError::Database(_) => "internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn validation_failures_map_to_bad_request() {
        // ---
        for err in [
            AppError::UnknownDevice("dev-9".into()),
            AppError::DuplicateDeviceId("dev-1".into()),
            AppError::InvalidStatus("Sleeping".into()),
        ] {
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn database_failures_map_to_internal_error() {
        // ---
        let err = AppError::Database(sqlx::Error::PoolClosed);
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unknown_device_message_names_the_missing_id() {
        // ---
        let err = AppError::UnknownDevice("missing-dev".into());
        assert!(err.to_string().contains("missing-dev"));
    }
}
