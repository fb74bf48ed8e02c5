use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

/// Seconds a client should wait before retrying after a storage outage
const STORAGE_RETRY_AFTER_SECS: u32 = 5;

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

/// Application errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Project {0} not found")]
    ProjectNotFound(i32),

    #[error("Project {0} is not accepting events")]
    ProjectInactive(i32),

    #[error("Event {0} was already recorded")]
    DuplicateEvent(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Storage temporarily unavailable")]
    StorageUnavailable(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable error type
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::UnsupportedMediaType(_) => "UnsupportedMediaType",
            AppError::MalformedPayload(_) => "MalformedPayload",
            AppError::ValidationFailed(_) => "ValidationFailed",
            AppError::ProjectNotFound(_) => "ProjectNotFound",
            AppError::ProjectInactive(_) => "ProjectInactive",
            AppError::DuplicateEvent(_) => "DuplicateEvent",
            AppError::NotFound(_) => "NotFound",
            AppError::Conflict(_) => "Conflict",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::StorageUnavailable(_) => "StorageUnavailable",
            AppError::Database(_) => "InternalError",
            AppError::Internal(_) => "InternalError",
        }
    }

    /// Message safe to return to clients (storage detail stays in the log)
    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if is_transient(&err) {
            AppError::StorageUnavailable(err)
        } else {
            AppError::Database(err)
        }
    }
}

/// Whether a storage failure is worth retrying on the caller side
fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| {
                code.starts_with("08")
                    || matches!(code.as_ref(), "57P01" | "57P02" | "57P03" | "40001" | "40P01")
            })
            .unwrap_or(false),
        _ => false,
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            AppError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ProjectNotFound(_) => StatusCode::NOT_FOUND,
            AppError::ProjectInactive(_) => StatusCode::FORBIDDEN,
            AppError::DuplicateEvent(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Database(e) => log::error!("Database error: {}", e),
            AppError::StorageUnavailable(e) => log::error!("Storage unavailable: {}", e),
            AppError::Internal(msg) => log::error!("Internal error: {}", msg),
            _ => {}
        }

        let response = ErrorResponse {
            error: ErrorDetail {
                error_type: self.error_type().to_string(),
                message: self.public_message(),
            },
        };

        let mut builder = HttpResponse::build(self.status_code());
        if matches!(self, AppError::StorageUnavailable(_)) {
            builder.insert_header(("Retry-After", STORAGE_RETRY_AFTER_SECS.to_string()));
        }
        builder.json(response)
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
