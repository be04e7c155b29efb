//! CLI error types.

use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The config file could not be loaded or names an unknown profile.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client or event stream could not be set up.
    #[error(transparent)]
    Client(#[from] client::Error),

    /// A request to the session service failed.
    #[error(transparent)]
    Api(#[from] wire::Error),

    /// A wait or dispatch operation failed.
    #[error(transparent)]
    Skills(#[from] skills::Error),

    /// Output could not be rendered as JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
