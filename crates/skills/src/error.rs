use thiserror::Error;

use crate::registry::DispatchMode;
use crate::wait::WaitTimeout;

/// Errors that escape the skill engine.
///
/// Handler failures are not errors here; they become failure envelopes on
/// the dispatch record.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(
        "remote skill catalog mutation is create-time only; register skills while creating \
         the session (session {session_id})"
    )]
    CatalogLocked { session_id: String },

    #[error("invalid skill name: {0:?}")]
    InvalidName(String),

    #[error(
        "remote skill dispatch mode conflict: session locked to '{current}', attempted \
         '{attempted}'. Call reset_dispatch_mode() before switching dispatch strategies."
    )]
    ModeConflict {
        current: DispatchMode,
        attempted: DispatchMode,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Timeout(#[from] WaitTimeout),

    #[error("turn {turn_id} completed without an assistant reply")]
    MissingReply { turn_id: String },

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Api(#[from] wire::Error),

    #[error("runtime error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
