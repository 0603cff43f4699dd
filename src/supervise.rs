//! The supervised retry loop.
//!
//! A [`Supervisor`] runs a [`RenderJob`] through a [`Renderer`] until the final frame is on
//! disk and the renderer exited cleanly. After every attempt the output directory is scanned
//! again: the artifacts on disk are the only trustworthy record of what survived a crash, so
//! a failed attempt is followed by a relaunch starting right after the highest finished frame.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::classify::{DEFAULT_HEARTBEAT_INTERVAL, LineClassifier, ProgressEvent};
use crate::foundation::core::CancelToken;
use crate::foundation::error::{KeeperError, KeeperResult};
use crate::job::RenderJob;
use crate::process::{AttemptExit, Renderer};
use crate::scan::{FrameSet, last_completed, scan_completed_frames};

/// Default number of failed attempts tolerated before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Retry-loop configuration.
#[derive(Clone, Debug)]
pub struct SupervisorOpts {
    /// Failed attempts allowed before the job is reported as exhausted.
    ///
    /// At least one attempt always runs.
    pub max_retries: u32,
    /// Exit codes that count as a clean renderer exit.
    pub accepted_exit_codes: BTreeSet<i32>,
    /// Minimum time between two surfaced progress heartbeats.
    pub heartbeat_interval: Duration,
}

impl Default for SupervisorOpts {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            accepted_exit_codes: BTreeSet::from([0]),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

/// Where the retry loop currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// About to launch an attempt.
    Starting,
    /// Renderer running; output is being classified.
    Running,
    /// Renderer exited; checking the output directory.
    Evaluating,
    /// Attempt failed; the start frame was advanced for the next one.
    Retrying,
    /// Final frame written and renderer exited cleanly.
    Done,
    /// Retry budget used up.
    Exhausted,
    /// Stopped by a cancellation request.
    Cancelled,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Evaluating => "evaluating",
            Self::Retrying => "retrying",
            Self::Done => "done",
            Self::Exhausted => "exhausted",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Decision taken after an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// The job is complete.
    Done,
    /// No retries left.
    Exhausted,
    /// Relaunch starting at `next_start`.
    Retry {
        /// First frame of the next attempt.
        next_start: u64,
    },
}

/// Result of a successful run.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RenderSummary {
    /// Directory holding the rendered frames.
    pub output_dir: PathBuf,
    /// Number of frame artifacts found on disk.
    pub frames_completed: usize,
    /// Highest frame found on disk.
    pub last_frame: Option<u64>,
    /// Exit code of the final attempt.
    pub exit_code: i32,
    /// Attempts launched, including the successful one.
    pub attempts: u32,
}

/// Drives a [`RenderJob`] to completion, relaunching the renderer after crashes.
pub struct Supervisor<R> {
    job: RenderJob,
    renderer: R,
    opts: SupervisorOpts,
    cancel: CancelToken,
    failed_attempts: u32,
    phase: Phase,
}

impl<R: Renderer> Supervisor<R> {
    /// Create a supervisor for `job`.
    pub fn new(job: RenderJob, renderer: R, opts: SupervisorOpts) -> Self {
        Self {
            job,
            renderer,
            opts,
            cancel: CancelToken::new(),
            failed_attempts: 0,
            phase: Phase::Starting,
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the running attempt and the loop when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The job in its current state (its start frame moves between attempts).
    pub fn job(&self) -> &RenderJob {
        &self.job
    }

    /// Current phase of the loop.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Failed attempts so far.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Move the start frame past the frames already present in the output directory.
    ///
    /// Used when resuming into an existing directory. The start never moves backwards and
    /// never past the last frame. Returns the new start frame.
    pub fn resume_from_disk(&mut self) -> KeeperResult<u64> {
        let completed = scan_completed_frames(&self.job.output_dir)?;
        let start = self.next_start(&completed);
        tracing::info!(
            dir = %self.job.output_dir.display(),
            found = completed.len(),
            start,
            "resuming from existing output"
        );
        self.job.range.start = start;
        Ok(start)
    }

    /// Run attempts until the job is done, the retry budget is spent, or cancellation.
    pub fn run(&mut self) -> KeeperResult<RenderSummary> {
        loop {
            self.enter(Phase::Starting);
            if self.cancel.is_cancelled() {
                self.enter(Phase::Cancelled);
                return Err(KeeperError::Cancelled);
            }
            tracing::info!(
                attempt = self.failed_attempts + 1,
                start = self.job.range.start,
                end = self.job.range.end,
                "launching renderer"
            );

            self.enter(Phase::Running);
            let exit = match self.run_attempt() {
                Ok(exit) => exit,
                Err(KeeperError::Cancelled) => {
                    self.enter(Phase::Cancelled);
                    return Err(KeeperError::Cancelled);
                }
                Err(e) => return Err(e),
            };

            self.enter(Phase::Evaluating);
            let completed = match scan_completed_frames(&self.job.output_dir) {
                Ok(frames) => frames,
                Err(e) => {
                    tracing::warn!(error = %e, "could not scan output directory");
                    FrameSet::new()
                }
            };

            match self.evaluate(exit, &completed) {
                Verdict::Done => {
                    self.enter(Phase::Done);
                    let summary = RenderSummary {
                        output_dir: self.job.output_dir.clone(),
                        frames_completed: completed.len(),
                        last_frame: last_completed(&completed),
                        exit_code: exit.code().unwrap_or_default(),
                        attempts: self.failed_attempts + 1,
                    };
                    tracing::info!(
                        frames = summary.frames_completed,
                        exit_code = summary.exit_code,
                        attempts = summary.attempts,
                        "render complete"
                    );
                    return Ok(summary);
                }
                Verdict::Exhausted => {
                    self.enter(Phase::Exhausted);
                    let last = last_completed(&completed);
                    tracing::error!(
                        %exit,
                        last_completed = ?last,
                        attempts = self.failed_attempts,
                        "giving up: retry budget exhausted"
                    );
                    return Err(KeeperError::RetriesExhausted {
                        attempts: self.failed_attempts,
                        last_completed: last,
                        last_exit: exit,
                    });
                }
                Verdict::Retry { next_start } => {
                    self.enter(Phase::Retrying);
                    tracing::error!(
                        %exit,
                        failed_at = next_start,
                        remaining = self.opts.max_retries - self.failed_attempts,
                        "render attempt failed; retrying"
                    );
                    self.job.range.start = next_start;
                }
            }
        }
    }

    /// Record the outcome of one attempt and decide what happens next.
    ///
    /// Counts the attempt as failed unless it exited with an accepted code and the final
    /// frame is in `completed`.
    pub fn evaluate(&mut self, exit: AttemptExit, completed: &FrameSet) -> Verdict {
        let clean = exit
            .code()
            .is_some_and(|c| self.opts.accepted_exit_codes.contains(&c));
        if clean && completed.contains(&self.job.range.end) {
            return Verdict::Done;
        }

        self.failed_attempts += 1;
        if self.failed_attempts >= self.opts.max_retries {
            return Verdict::Exhausted;
        }
        Verdict::Retry {
            next_start: self.next_start(completed),
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::trace!(%phase, "supervisor phase");
        self.phase = phase;
    }

    fn next_start(&self, completed: &FrameSet) -> u64 {
        let Some(last) = last_completed(completed) else {
            return self.job.range.start;
        };
        last.saturating_add(1)
            .max(self.job.range.start)
            .min(self.job.range.end)
    }

    fn run_attempt(&mut self) -> KeeperResult<AttemptExit> {
        let mut classifier = LineClassifier::new(self.opts.heartbeat_interval);
        let exit = self
            .renderer
            .run_attempt(&self.job, &self.cancel, &mut |line| {
                if let Some(event) = classifier.classify(line) {
                    report(&event);
                }
            })?;
        tracing::debug!(frames = classifier.frames_saved(), %exit, "attempt finished");
        Ok(exit)
    }
}

fn report(event: &ProgressEvent) {
    match event {
        ProgressEvent::Heartbeat { line } => {
            tracing::info!(target: "framekeeper::progress", "{line}");
        }
        ProgressEvent::FrameSaved { path, elapsed, .. } => {
            tracing::info!(
                target: "framekeeper::progress",
                path = %path,
                elapsed = %elapsed,
                "frame saved"
            );
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/supervise.rs"]
mod tests;
