/// Error types for Yatube
///
/// Errors are converted to HTML error responses. 404 pages are re-rendered with the
/// site template by the error handler middleware in `routes`.
use actix_web::{error::ResponseError, http::header::ContentType, http::StatusCode, HttpResponse};
use std::fmt;

/// Result type for Yatube operations
pub type Result<T> = std::result::Result<T, AppError>;

/// SQLSTATE codes that mean a constraint rejected the write.
const INTEGRITY_SQLSTATES: &[&str] = &["23505", "23514", "23503", "23502"];

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Database operation failed
    DatabaseError(String),

    /// Cache operation failed
    CacheError(String),

    /// Template rendering failed
    TemplateError(String),

    /// Validation failed
    ValidationError(String),

    /// A uniqueness, check or foreign key constraint rejected a write
    Integrity(String),

    /// Resource not found
    NotFound(String),

    /// Unauthorized access
    Unauthorized(String),

    /// Forbidden access
    Forbidden(String),

    /// Internal server error
    Internal(String),

    /// Bad request
    BadRequest(String),
}

impl AppError {
    pub fn is_integrity(&self) -> bool {
        matches!(self, AppError::Integrity(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::CacheError(msg) => write!(f, "Cache error: {}", msg),
            AppError::TemplateError(msg) => write!(f, "Template error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::Integrity(msg) => write!(f, "Integrity error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::CacheError(_) | AppError::TemplateError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Integrity(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        // Internal details stay in the logs.
        let reason = status.canonical_reason().unwrap_or("Error");
        HttpResponse::build(status)
            .insert_header(ContentType::html())
            .body(format!(
                "<!DOCTYPE html><html><head><title>{code} {reason}</title></head>\
                 <body><h1>{code} {reason}</h1></body></html>",
                code = status.as_u16(),
                reason = reason,
            ))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if let Some(code) = db_err.code() {
                if INTEGRITY_SQLSTATES.contains(&code.as_ref()) {
                    return AppError::Integrity(db_err.message().to_string());
                }
            }
        }
        AppError::DatabaseError(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError(err.to_string())
    }
}

impl From<tera::Error> for AppError {
    fn from(err: tera::Error) -> Self {
        // tera nests the interesting part in the source chain
        let mut msg = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            msg.push_str(": ");
            msg.push_str(&inner.to_string());
            source = inner.source();
        }
        AppError::TemplateError(msg)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
