//! Error types for dayplan
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, invalid config)
//! - 3: Recovery plan could not be built (retryable)
//! - 4: Operation failed (io, storage, plan proposer unreachable)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the dayplan CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const RETRYABLE: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for dayplan operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    // Retryable recovery failure (exit code 3)
    #[error("Recovery plan rejected: {0}")]
    PlanRejected(String),

    // Operation failures (exit code 4)
    #[error("Plan proposer unavailable: {0}")]
    ProposerUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidDate(_)
            | Error::TaskNotFound(_) => exit_codes::USER_ERROR,

            Error::PlanRejected(_) => exit_codes::RETRYABLE,

            // Operation failures
            Error::ProposerUnavailable(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for JSON error output, when the variant carries any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TaskNotFound(id) => Some(serde_json::json!({ "task_id": id })),
            Error::LockFailed(path) => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }
}

/// Result type alias for dayplan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
