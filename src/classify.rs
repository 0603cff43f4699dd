//! Renderer output classification.
//!
//! Blender prints many progress lines per second while rendering. [`LineClassifier`] reduces
//! that stream to two kinds of operator-facing events:
//!
//! - a rate-limited [`ProgressEvent::Heartbeat`] taken from `Fra:` progress lines;
//! - one [`ProgressEvent::FrameSaved`] per finished frame, pairing the `Saved: '<path>'` line
//!   with the `Time: <elapsed> (Saving: <saving>)` line that follows it.
//!
//! Everything else is logged at `debug` and otherwise dropped.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::Regex;

/// Default minimum time between two surfaced heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Stand-in for a `Saved:` line whose path could not be extracted.
pub const UNPARSED_PATH: &str = "<unparsed path>";
/// Stand-in used when a frame finished without a preceding `Saved:` line.
pub const NO_SAVED_PATH: &str = "<no saved path>";
/// Stand-in for a `Time:` line whose duration could not be extracted.
pub const UNPARSED_TIME: &str = "<unparsed time>";

const SAVED_PREFIX: &str = "Saved:";
const PROGRESS_PREFIX: &str = "Fra:";
const TIME_PREFIX: &str = "Time:";

static TIME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Time:\s*(?P<elapsed>[0-9:.]+)\s*\(Saving:\s*(?P<saving>[0-9:.]+)\)")
        .expect("time line pattern is valid")
});

/// Event surfaced to the operator.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// A progress line let through the heartbeat rate limit.
    Heartbeat {
        /// The raw (trimmed) progress line.
        line: String,
    },
    /// A frame finished rendering and was written to disk.
    FrameSaved {
        /// Artifact path reported by the renderer, or a placeholder.
        path: String,
        /// Render time as printed by the renderer, or a placeholder.
        elapsed: String,
        /// `elapsed` converted to a duration, when it parses.
        elapsed_secs: Option<Duration>,
    },
}

/// Streaming classifier for one renderer attempt.
///
/// Create a fresh instance per attempt; no state carries over between attempts.
#[derive(Debug)]
pub struct LineClassifier {
    heartbeat_interval: Duration,
    last_heartbeat: Option<Instant>,
    pending_saved: Option<String>,
    frames_saved: u64,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}

impl LineClassifier {
    /// Create a classifier surfacing at most one heartbeat per `heartbeat_interval`.
    pub fn new(heartbeat_interval: Duration) -> Self {
        Self {
            heartbeat_interval,
            last_heartbeat: None,
            pending_saved: None,
            frames_saved: 0,
        }
    }

    /// Number of [`ProgressEvent::FrameSaved`] events emitted so far.
    pub fn frames_saved(&self) -> u64 {
        self.frames_saved
    }

    /// Classify `line` using the current time.
    pub fn classify(&mut self, line: &str) -> Option<ProgressEvent> {
        self.classify_at(line, Instant::now())
    }

    /// Classify `line` as if it was read at `now`.
    pub fn classify_at(&mut self, line: &str, now: Instant) -> Option<ProgressEvent> {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix(SAVED_PREFIX) {
            self.pending_saved = Some(saved_path(rest));
            return None;
        }

        if line.starts_with(PROGRESS_PREFIX) {
            let due = match self.last_heartbeat {
                None => true,
                Some(last) => now.saturating_duration_since(last) > self.heartbeat_interval,
            };
            if !due {
                return None;
            }
            self.last_heartbeat = Some(now);
            return Some(ProgressEvent::Heartbeat {
                line: line.to_string(),
            });
        }

        if line.starts_with(TIME_PREFIX) {
            let (elapsed, elapsed_secs) = match TIME_LINE.captures(line) {
                Some(caps) => {
                    let raw = caps["elapsed"].to_string();
                    let secs = parse_clock(&raw);
                    (raw, secs)
                }
                None => {
                    tracing::debug!(line, "unrecognized frame timing line");
                    (UNPARSED_TIME.to_string(), None)
                }
            };
            let path = self
                .pending_saved
                .take()
                .unwrap_or_else(|| NO_SAVED_PATH.to_string());
            self.last_heartbeat = Some(now);
            self.frames_saved += 1;
            return Some(ProgressEvent::FrameSaved {
                path,
                elapsed,
                elapsed_secs,
            });
        }

        tracing::debug!(target: "framekeeper::renderer", "{line}");
        None
    }
}

fn saved_path(rest: &str) -> String {
    let path = rest.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if path.is_empty() {
        tracing::debug!(rest, "could not extract saved path");
        UNPARSED_PATH.to_string()
    } else {
        path.to_string()
    }
}

/// Parse a renderer clock string (`MM:SS.ff` or `HH:MM:SS.ff`).
pub fn parse_clock(text: &str) -> Option<Duration> {
    let mut parts = text.rsplit(':');
    let last = parts.next()?;
    let (secs, frac) = last.split_once('.').unwrap_or((last, ""));
    let secs: u64 = secs.parse().ok()?;
    let mins: u64 = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    let hours: u64 = match parts.next() {
        Some(h) => h.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || secs >= 60 {
        return None;
    }
    if frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<9}").parse().ok()?
    };
    let total = hours
        .checked_mul(60)?
        .checked_add(mins)?
        .checked_mul(60)?
        .checked_add(secs)?;
    Some(Duration::new(total, nanos))
}

#[cfg(test)]
#[path = "../tests/unit/classify.rs"]
mod tests;
