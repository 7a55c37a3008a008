//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug, PartialEq)]
pub enum AvError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// An action index outside of the action space.
    #[error("Invalid action {0}, the action space has {1} actions")]
    InvalidAction(usize, usize),

    /// `step()` was called before the first `reset()`.
    #[error("The environment must be reset before stepping")]
    NotReset,

    /// `step()` was called after the episode had ended.
    #[error("The episode is over after {0} steps, reset the environment")]
    EpisodeOver(usize),

    /// A buffer does not have the expected number of elements.
    #[error("Shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch {
        /// Expected number of elements.
        expected: usize,
        /// Actual number of elements.
        actual: usize,
    },
}
