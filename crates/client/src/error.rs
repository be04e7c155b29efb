use thiserror::Error;

/// Errors raised while building clients or opening the event stream.
///
/// Request failures are reported as [`wire::Error`] by the client itself.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid header {name}: {reason}")]
    Header { name: String, reason: String },

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Api(#[from] wire::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
