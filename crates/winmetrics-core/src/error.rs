//! Shared error type across winmetrics crates.
//!
//! Counters and averages never produce errors. This surface covers the
//! registry, configuration loading and gateway startup.

use thiserror::Error;

/// Stable error codes, rendered as `code` in RPC error replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid input / malformed configuration.
    BadRequest,
    /// A registry name is already taken.
    AlreadyRegistered,
    /// A registry name or RPC method does not exist.
    NotFound,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::AlreadyRegistered => "ALREADY_REGISTERED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, WinMetricsError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum WinMetricsError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("already registered: {0}")]
    AlreadyRegistered(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl WinMetricsError {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            WinMetricsError::BadRequest(_) => ErrorCode::BadRequest,
            WinMetricsError::AlreadyRegistered(_) => ErrorCode::AlreadyRegistered,
            WinMetricsError::NotFound(_) => ErrorCode::NotFound,
            WinMetricsError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            WinMetricsError::Internal(_) => ErrorCode::Internal,
        }
    }
}
