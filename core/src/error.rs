use std::fmt;

/// Transport-agnostic error taxonomy shared by every member of the workspace.
///
/// The HTTP edge (api crate) wraps this in its own `AppError` for `IntoResponse`;
/// the worker and recurring-generator binaries match on these variants directly
/// to decide retry vs. drop.
#[derive(Debug)]
pub enum CoreError {
    Validation(String),
    NotFound(String),
    Forbidden(String),
    Unauthenticated(String),
    Conflict(String),
    Transient(String),
    FatalConfig(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Validation(msg) => write!(f, "validation error: {msg}"),
            CoreError::NotFound(msg) => write!(f, "not found: {msg}"),
            CoreError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            CoreError::Unauthenticated(msg) => write!(f, "unauthenticated: {msg}"),
            CoreError::Conflict(msg) => write!(f, "conflict: {msg}"),
            CoreError::Transient(msg) => write!(f, "transient error: {msg}"),
            CoreError::FatalConfig(msg) => write!(f, "fatal config error: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

impl CoreError {
    /// True for errors the caller should back off and retry rather than surface.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Transient(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
