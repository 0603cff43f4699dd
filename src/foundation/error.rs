use std::path::PathBuf;

use crate::process::AttemptExit;

/// Convenience result type used across framekeeper.
pub type KeeperResult<T> = Result<T, KeeperError>;

/// Top-level error taxonomy returned by the supervisor and its collaborators.
///
/// Only [`KeeperError::Discovery`], [`KeeperError::RetriesExhausted`] and
/// [`KeeperError::Cancelled`] are expected to reach the caller of a normal run; failed
/// attempts and classifier anomalies are absorbed by the retry loop.
#[derive(thiserror::Error, Debug)]
pub enum KeeperError {
    /// Invalid user-provided values (ranges, options).
    #[error("validation error: {0}")]
    Validation(String),

    /// The renderer could not report the scene frame range. Never retried.
    #[error("range discovery error: {0}")]
    Discovery(String),

    /// The renderer could not be spawned or waited on during an attempt.
    #[error("launch error: {0}")]
    Launch(String),

    /// Every allowed attempt failed before the final frame was written.
    #[error(
        "retries exhausted after {attempts} failed attempts (last completed frame: {}, last exit: {last_exit})",
        display_frame(.last_completed)
    )]
    RetriesExhausted {
        /// Number of failed attempts.
        attempts: u32,
        /// Highest frame found on disk after the last attempt.
        last_completed: Option<u64>,
        /// Exit status of the last attempt.
        last_exit: AttemptExit,
    },

    /// Cancellation was requested; the renderer was stopped and no relaunch happened.
    #[error("render cancelled")]
    Cancelled,

    /// Filesystem failure on a known path.
    #[error("io error at '{}': {source}", .path.display())]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Wrapped lower-level error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KeeperError {
    /// Build a [`KeeperError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`KeeperError::Discovery`] value.
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Build a [`KeeperError::Launch`] value.
    pub fn launch(msg: impl Into<String>) -> Self {
        Self::Launch(msg.into())
    }

    /// Build a [`KeeperError::Io`] value for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn display_frame(frame: &Option<u64>) -> String {
    match frame {
        Some(f) => f.to_string(),
        None => "none".to_string(),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
