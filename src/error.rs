use std::time::Duration;

use axum::Json;
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// Failures of the cache layer. A blocked limiter check is not one of them.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The networked store cannot be reached. Fatal for the whole process.
    #[error("cache backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("cache write rejected: {0}")]
    StoreWriteFailure(String),

    #[error("cache backend error: {0}")]
    Backend(redis::RedisError),

    #[error("persistent store error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("cached value is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("counter {key} kept changing after {attempts} attempts")]
    Contention { key: String, attempts: usize },
}

impl CacheError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        CacheError::InvalidArgument(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CacheError::BackendUnavailable(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            CacheError::BackendUnavailable(e.to_string())
        } else {
            CacheError::Backend(e)
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    TooManyRequests { retry_in: Duration },
    InvalidToken(&'static str),
    PermissionDenied(String),
    InvalidArgument(String),
    ServiceUnavailable,
    InternalServerError,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::InvalidArgument(msg) => AppError::InvalidArgument(msg),
            CacheError::BackendUnavailable(_) => AppError::ServiceUnavailable,
            _ => AppError::InternalServerError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, error_message) = match self {
            AppError::TooManyRequests { retry_in } => {
                // Retry-After only speaks whole seconds
                let secs = retry_in.as_millis().div_ceil(1000);
                retry_after = Some(secs);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    format!("Too Many Requests, retry in {}ms", retry_in.as_millis()),
                )
            }
            AppError::InvalidToken(reason) => (StatusCode::UNAUTHORIZED, reason.to_string()),
            AppError::PermissionDenied(permission) => (
                StatusCode::FORBIDDEN,
                format!("NoPermissions: {}", permission),
            ),
            AppError::InvalidArgument(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Cache backend unavailable".to_string(),
            ),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal Server Error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message,
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs as u64));
        }
        response
    }
}
