//! Error taxonomy shared by every backend and engine (§7).
//!
//! A flat sum-type, not a class hierarchy: callers match on `TfmError`
//! kinds instead of inspecting a string message.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type TfmResult<T> = Result<T, TfmError>;

#[derive(Debug, Error)]
pub enum TfmError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("I/O failure: {0}")]
    IoFailure(#[source] std::io::Error),

    #[error("credentials missing: {0}")]
    CredentialsMissing(String),

    #[error("credentials invalid: {0}")]
    CredentialsInvalid(String),

    #[error("could not decode: {0}")]
    DecodingFailure(String),

    #[error("cancelled")]
    Cancelled,

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),
}

impl TfmError {
    /// True for errors a caller may reasonably retry (§7: `IoFailure` is
    /// "transient/network/host I/O error; retryable at caller discretion").
    pub fn is_retryable(&self) -> bool {
        matches!(self, TfmError::IoFailure(_))
    }
}

impl From<std::io::Error> for TfmError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match err.kind() {
            NotFound => TfmError::NotFound(err.to_string()),
            PermissionDenied => TfmError::PermissionDenied(err.to_string()),
            AlreadyExists => TfmError::AlreadyExists(err.to_string()),
            InvalidInput | InvalidData => TfmError::InvalidName(err.to_string()),
            _ => TfmError::IoFailure(err),
        }
    }
}

impl From<zip::result::ZipError> for TfmError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::FileNotFound => TfmError::NotFound(err.to_string()),
            zip::result::ZipError::Io(io_err) => TfmError::IoFailure(io_err),
            other => TfmError::DecodingFailure(other.to_string()),
        }
    }
}

impl From<ssh2::Error> for TfmError {
    fn from(err: ssh2::Error) -> Self {
        TfmError::IoFailure(std::io::Error::other(err.to_string()))
    }
}

impl From<rusqlite::Error> for TfmError {
    fn from(err: rusqlite::Error) -> Self {
        TfmError::IoFailure(std::io::Error::other(err.to_string()))
    }
}
