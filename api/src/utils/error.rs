use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;
use taskflow_core::error::CoreError;

/// HTTP-edge error taxonomy (spec §7). Every variant maps to one of the
/// kinds the core crate already distinguishes; `AppError` only adds the
/// transport-level ones (`Unauthenticated` arriving as a malformed header,
/// driver errors) that never reach `CoreError`.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Forbidden(String),
    Unauthenticated(String),
    Conflict(String),
    Transient(String),
    FatalConfig(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "validation error: {msg}"),
            AppError::NotFound(msg) => write!(f, "not found: {msg}"),
            AppError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            AppError::Unauthenticated(msg) => write!(f, "unauthenticated: {msg}"),
            AppError::Conflict(msg) => write!(f, "conflict: {msg}"),
            AppError::Transient(msg) => write!(f, "transient error: {msg}"),
            AppError::FatalConfig(msg) => write!(f, "fatal config error: {msg}"),
            AppError::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => AppError::Validation(msg),
            CoreError::NotFound(msg) => AppError::NotFound(msg),
            CoreError::Forbidden(msg) => AppError::Forbidden(msg),
            CoreError::Unauthenticated(msg) => AppError::Unauthenticated(msg),
            CoreError::Conflict(msg) => AppError::Conflict(msg),
            CoreError::Transient(msg) => AppError::Transient(msg),
            CoreError::FatalConfig(msg) => AppError::FatalConfig(msg),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("database error: {:?}", err);
        AppError::Transient("database error occurred".to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        tracing::error!("cache error: {:?}", err);
        AppError::Transient("cache error occurred".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Transient(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "please try again".to_string(),
            ),
            AppError::FatalConfig(msg) => {
                tracing::error!("fatal config error surfaced at request time: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "server misconfigured".to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "data": serde_json::Value::Null,
            "popup": serde_json::Value::Null,
            "error": message,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
