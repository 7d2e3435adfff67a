//! Error types and error codes for entlock
//!
//! This module defines:
//! - `LockError`: the structured error every locker operation completes with
//! - `ErrorCode`: numeric codes and messages for callers that surface errors over a wire
//! - `LastError`: the diagnostic snapshot the locker keeps for health checks

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, LockError>;

/// Locker error types
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The key is already held by another owner
    #[error("lock '{key}' is already held")]
    Conflict { key: String },

    /// The locker is not active (not initialized, or shut down)
    #[error("lock service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The backing store could not be reached or answered with an unexpected shape
    #[error("lock backend error: {0}")]
    Backend(String),

    /// The active engine does not implement the operation
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("caused: {0}")]
    IllegalArgument(String),
}

impl LockError {
    pub fn conflict(key: impl Into<String>) -> Self {
        LockError::Conflict { key: key.into() }
    }

    /// Symbolic name of the error, stable across releases
    pub fn name(&self) -> &'static str {
        match self {
            LockError::Conflict { .. } => "CONFLICT",
            LockError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            LockError::Backend(_) => "BACKEND_ERROR",
            LockError::Unsupported(_) => "UNSUPPORTED_OPERATION",
            LockError::IllegalArgument(_) => "PARAMETER_VALIDATE_ERROR",
        }
    }

    pub fn error_code(&self) -> ErrorCode<'static> {
        match self {
            LockError::Conflict { .. } => RESOURCE_CONFLICT,
            LockError::ServiceUnavailable(_) => SERVICE_UNAVAILABLE,
            LockError::Backend(_) => BACKEND_ERROR,
            LockError::Unsupported(_) => UNSUPPORTED_OPERATION,
            LockError::IllegalArgument(_) => PARAMETER_VALIDATE_ERROR,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, LockError::Conflict { .. })
    }

    /// The key a conflict was reported for, if any
    pub fn conflict_key(&self) -> Option<&str> {
        match self {
            LockError::Conflict { key } => Some(key),
            _ => None,
        }
    }
}

/// Error code structure for API responses
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCode<'a> {
    pub code: i32,
    pub message: &'a str,
}

pub const SUCCESS: ErrorCode<'static> = ErrorCode {
    code: 0,
    message: "success",
};

pub const PARAMETER_VALIDATE_ERROR: ErrorCode<'static> = ErrorCode {
    code: 20002,
    message: "parameter validate error",
};

pub const RESOURCE_CONFLICT: ErrorCode<'static> = ErrorCode {
    code: 20005,
    message: "resource conflict",
};

pub const SERVICE_UNAVAILABLE: ErrorCode<'static> = ErrorCode {
    code: 30000,
    message: "lock service unavailable",
};

pub const BACKEND_ERROR: ErrorCode<'static> = ErrorCode {
    code: 30001,
    message: "lock backend error",
};

pub const UNSUPPORTED_OPERATION: ErrorCode<'static> = ErrorCode {
    code: 30002,
    message: "unsupported operation",
};

/// Snapshot of the most recent failed locker operation
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    pub code: i32,
    pub name: String,
    pub message: String,
    /// Unix millis
    pub at: i64,
}

impl From<&LockError> for LastError {
    fn from(err: &LockError) -> Self {
        Self {
            code: err.error_code().code,
            name: err.name().to_string(),
            message: err.to_string(),
            at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
