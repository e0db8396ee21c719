//! Client side of the tracker: the logic the browser extension runs, minus
//! presentation.
//!
//! [`session::SessionContext`] carries the bearer token, [`api::TaskApi`]
//! talks to the server, [`board::TaskBoard`] caches server-confirmed tasks and
//! [`sweep::CheckpointSweep`] persists running timers periodically.

pub mod api;
pub mod board;
pub mod session;
pub mod sweep;
#[cfg(test)]
mod testing;

use thiserror::Error;

use crate::tracker::TrackerError;

pub use api::{HttpTaskApi, TaskApi};
pub use board::TaskBoard;
pub use session::SessionContext;
pub use sweep::CheckpointSweep;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("not signed in")]
    NotSignedIn,

    #[error("task {0} is not on the board")]
    UnknownTask(String),

    /// Refused locally before any request was sent.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

impl ClientError {
    /// Whether the server rejected the token, meaning the user must log in
    /// again.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::NotSignedIn | Self::Status { status: 401, .. })
    }
}
