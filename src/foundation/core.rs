use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{KeeperError, KeeperResult};

/// Inclusive frame range `[start, end]` of a render job.
///
/// `start` is advanced by the supervisor between attempts; `end` stays fixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// First frame to render (inclusive).
    pub start: u64,
    /// Last frame to render (inclusive).
    pub end: u64,
}

impl FrameRange {
    /// Create a validated range with `start <= end`.
    pub fn new(start: u64, end: u64) -> KeeperResult<Self> {
        if start > end {
            return Err(KeeperError::validation(format!(
                "frame range start ({start}) must be <= end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of frames contained in the range, saturating at `u64::MAX`.
    pub fn len_frames(self) -> u64 {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    /// Return `true` when `frame` is inside `[start, end]`.
    pub fn contains(self, frame: u64) -> bool {
        self.start <= frame && frame <= self.end
    }

    /// Clamp a frame number into this range.
    pub fn clamp(self, frame: u64) -> u64 {
        frame.clamp(self.start, self.end)
    }
}

/// Shared flag used to stop a running supervisor from another thread (or a signal handler).
///
/// Clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token in the "not cancelled" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return `true` once [`CancelToken::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
