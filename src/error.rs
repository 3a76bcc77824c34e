//! Cue errors
//!
//! Intake errors leave the engine untouched. `AllocationFailure` aborts the
//! current operation with the queue at its last consistent state.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CueError>;

#[derive(Debug, Error)]
pub enum CueError {
    /// The event time is missing, not a number, or not finite.
    #[error("invalid event time: {0}")]
    InvalidTime(String),

    /// The event carries nothing to dispatch.
    #[error("invalid event payload: no message to cue")]
    InvalidPayload,

    #[error("invalid expiration for '{class}': {reason}")]
    InvalidExpiration { class: String, reason: String },

    #[error("unknown message '{0}'")]
    UnknownMessage(String),

    /// Growing the queue failed.
    #[error("failed to allocate queue storage")]
    AllocationFailure,

    /// A runner or a chain of re-entrant passes did not settle.
    #[error("scheduling did not settle after {limit} passes")]
    RunawayScheduling { limit: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::collections::TryReserveError> for CueError {
    fn from(_: std::collections::TryReserveError) -> Self {
        CueError::AllocationFailure
    }
}
