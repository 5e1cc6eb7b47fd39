//! Result and error types for the core library

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// The first five variants form the public taxonomy returned by services.
/// `Database`, `Io`, `Json` and `Config` are raised by adapters and are
/// downgraded to `Internal` before they reach a caller.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Machine-checkable error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    Unauthorized,
    Conflict,
    Internal,
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Unauthorized(_) => ErrorKind::Unauthorized,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Internal(_)
            | Error::Database(_)
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_) => ErrorKind::Internal,
        }
    }

    /// True for errors raised below the service boundary
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Config(_) | Error::Io(_) | Error::Json(_)
        )
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Success/failure envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    /// Create a failed result
    pub fn fail(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            kind: Some(kind),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e.kind(), e.to_string()),
        }
    }
}
