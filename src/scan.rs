//! Completed-frame discovery from render output on disk.
//!
//! The renderer offers no checkpoint protocol, so the artifacts themselves are the only
//! record of finished work: a file named `<frame>.<ext>` directly inside the output
//! directory means that frame is done.

use std::collections::BTreeSet;
use std::path::Path;

use crate::foundation::error::{KeeperError, KeeperResult};

/// Ordered set of frame numbers that have an artifact on disk.
pub type FrameSet = BTreeSet<u64>;

/// List the frames with a completed artifact in `dir`.
///
/// A missing directory yields an empty set. Only regular files directly inside `dir` are
/// considered; names whose stem (everything before the last `.`) is not an unsigned integer
/// are skipped.
pub fn scan_completed_frames(dir: &Path) -> KeeperResult<FrameSet> {
    let mut frames = FrameSet::new();
    if !dir.is_dir() {
        return Ok(frames);
    }

    let entries = std::fs::read_dir(dir).map_err(|e| KeeperError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| KeeperError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::debug!(path = %path.display(), "skipping non-utf8 artifact name");
            continue;
        };
        match frame_number(&name) {
            Some(frame) => {
                frames.insert(frame);
            }
            None => tracing::debug!(file = %name, "skipping non-numeric artifact name"),
        }
    }

    Ok(frames)
}

/// Parse the frame number out of an artifact file name (`0007.png` -> `7`).
pub fn frame_number(file_name: &str) -> Option<u64> {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => file_name,
    };
    // `u64::from_str` accepts a leading '+', which is not a frame name.
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Highest completed frame, if any.
pub fn last_completed(frames: &FrameSet) -> Option<u64> {
    frames.last().copied()
}

#[cfg(test)]
#[path = "../tests/unit/scan.rs"]
mod tests;
