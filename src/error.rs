//! Error types for the EMS server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stable numeric error codes returned to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NotFound = 4,
    Duplicate = 5,
    BadValue = 6,
    InvalidState = 7,
    InvalidQrCode = 8,
    InvalidTimestamp = 9,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid QR code")]
    InvalidQrCode,

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Authentication(_) | AppError::Authorization(_) => ErrorCode::NotAuthorized,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Validation(_) => ErrorCode::BadValue,
            AppError::Database(_) => ErrorCode::DbFailure,
            AppError::Conflict(_) => ErrorCode::Duplicate,
            AppError::InvalidState(_) => ErrorCode::InvalidState,
            AppError::InvalidQrCode => ErrorCode::InvalidQrCode,
            AppError::InvalidTimestamp(_) => ErrorCode::InvalidTimestamp,
            AppError::Internal(_) => ErrorCode::Failure,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(
                db.constraint()
                    .map(|c| format!("Duplicate value violates {}", c))
                    .unwrap_or_else(|| db.message().to_string()),
            ),
            _ => AppError::Database(error),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match &self {
            AppError::Authentication(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Authorization(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::InvalidQrCode => (
                StatusCode::BAD_REQUEST,
                "Scanned code does not match the equipment".to_string(),
            ),
            AppError::InvalidTimestamp(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;

    #[derive(Debug)]
    struct PgError {
        code: &'static str,
        constraint: Option<&'static str>,
    }

    impl std::fmt::Display for PgError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "postgres error {}", self.code)
        }
    }

    impl std::error::Error for PgError {}

    impl DatabaseError for PgError {
        fn message(&self) -> &str {
            "duplicate key value"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.code {
                "23505" => ErrorKind::UniqueViolation,
                "23503" => ErrorKind::ForeignKeyViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let error = AppError::from(sqlx::Error::Database(Box::new(PgError {
            code: "23505",
            constraint: Some("maintenance_records_task_item_key"),
        })));
        match error {
            AppError::Conflict(msg) => assert!(msg.contains("maintenance_records_task_item_key")),
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(
            AppError::Conflict(String::new()).into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn other_database_errors_stay_internal() {
        let error = AppError::from(sqlx::Error::Database(Box::new(PgError {
            code: "23503",
            constraint: None,
        })));
        assert!(matches!(error, AppError::Database(_)));
        assert!(matches!(AppError::from(sqlx::Error::RowNotFound), AppError::Database(_)));
    }
}
