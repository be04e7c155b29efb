//! Transport and payload error types.

use serde_json::Value;
use thiserror::Error;

/// Errors raised while talking to the remote session service.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request never produced a response (connection refused, reset, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request exceeded the client timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The service answered with a status the operation does not accept.
    #[error("{operation} failed with status {status}")]
    Status {
        operation: String,
        status: u16,
        body: Option<Value>,
    },

    /// The payload did not have the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Coarse classification of a rejected HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Auth,
    Validation,
    NotFound,
    Conflict,
    Gone,
    Locked,
    Server,
    Other,
}

impl StatusKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Auth,
            400 => Self::Validation,
            404 => Self::NotFound,
            409 => Self::Conflict,
            410 => Self::Gone,
            423 => Self::Locked,
            500..=u16::MAX => Self::Server,
            _ => Self::Other,
        }
    }
}

impl Error {
    /// Status classification, when the error came from an HTTP status.
    pub fn status_kind(&self) -> Option<StatusKind> {
        match self {
            Self::Status { status, .. } => Some(StatusKind::from_status(*status)),
            _ => None,
        }
    }

    /// Response body attached to a status error.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
