use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure, including file downloads.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    #[schema(example = false)]
    pub success: bool,
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `SESSION_MISSING`,
    /// `SESSION_INVALID`, `INVALID_CREDENTIALS`, `PERMISSION_DENIED`, `NOT_FOUND`,
    /// `CONFLICT`, `USERNAME_TAKEN`, `ATTEMPT_EXPIRED`, `NOT_VALIDATED`,
    /// `PAYLOAD_TOO_LARGE`, `UPSTREAM_FAILURE`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Amount must be greater than zero")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// No session cookie on the request.
    Unauthenticated,
    /// Session cookie present but unknown, expired, or for an inactive account.
    SessionInvalid,
    InvalidCredentials,
    /// Role or ownership mismatch.
    Forbidden,
    NotFound(String),
    /// Already submitted, already processed, scheduling overlap, and similar.
    Conflict(String),
    UsernameTaken,
    AttemptExpired,
    /// Receipt requested for a payment that is not validated.
    NotValidated,
    PayloadTooLarge(String),
    /// Database or disk failure. The detail is logged, never returned.
    Upstream(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        let (status, code, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg),
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "SESSION_MISSING",
                "Authentication required".into(),
            ),
            AppError::SessionInvalid => (
                StatusCode::UNAUTHORIZED,
                "SESSION_INVALID",
                "Invalid or expired session".into(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid username or password".into(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "PERMISSION_DENIED",
                "Insufficient permissions".into(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            AppError::UsernameTaken => (
                StatusCode::CONFLICT,
                "USERNAME_TAKEN",
                "Username is already taken".into(),
            ),
            AppError::AttemptExpired => (
                StatusCode::CONFLICT,
                "ATTEMPT_EXPIRED",
                "The time limit for this attempt has passed".into(),
            ),
            AppError::NotValidated => (
                StatusCode::CONFLICT,
                "NOT_VALIDATED",
                "Receipts are only available for validated payments".into(),
            ),
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            AppError::Upstream(detail) => {
                tracing::error!("Upstream failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "UPSTREAM_FAILURE",
                    "An unexpected error occurred".into(),
                )
            }
        };

        (
            status,
            ErrorBody {
                success: false,
                code,
                message,
            },
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => {
                tracing::warn!(path = %path, "Stored file missing on disk");
                AppError::NotFound("File not found".into())
            }
            StorageError::SizeLimitExceeded { limit, .. } => AppError::PayloadTooLarge(format!(
                "File exceeds maximum size of {limit} bytes"
            )),
            other => AppError::Upstream(other.to_string()),
        }
    }
}
