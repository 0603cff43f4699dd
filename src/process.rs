//! Running one renderer attempt.
//!
//! [`Renderer`] is the seam between the retry loop and the external program. The production
//! implementation, [`BlenderProcess`], spawns the job's command with stdout and stderr merged
//! into one pipe and forwards every line, in write order, to the caller.

use std::fmt;
use std::io::{BufRead as _, BufReader};
use std::process::{ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::foundation::core::CancelToken;
use crate::foundation::error::{KeeperError, KeeperResult};
use crate::job::RenderJob;

/// How a renderer attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptExit {
    /// The process exited with this status code.
    Code(i32),
    /// The process was terminated without an exit code (e.g. by a signal).
    Signal,
}

impl AttemptExit {
    /// Exit code, when the process reported one.
    pub fn code(self) -> Option<i32> {
        match self {
            Self::Code(c) => Some(c),
            Self::Signal => None,
        }
    }
}

impl From<ExitStatus> for AttemptExit {
    fn from(status: ExitStatus) -> Self {
        status.code().map_or(Self::Signal, Self::Code)
    }
}

impl fmt::Display for AttemptExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(c) => write!(f, "exit code {c}"),
            Self::Signal => f.write_str("terminated by signal"),
        }
    }
}

/// Runs one attempt of a [`RenderJob`] to completion.
pub trait Renderer {
    /// Launch the renderer for `job`, pass every output line to `on_line` in order, and
    /// return once the process has exited.
    ///
    /// When `cancel` is raised the process is killed and [`KeeperError::Cancelled`] is
    /// returned.
    fn run_attempt(
        &mut self,
        job: &RenderJob,
        cancel: &CancelToken,
        on_line: &mut dyn FnMut(&str),
    ) -> KeeperResult<AttemptExit>;
}

/// [`Renderer`] backed by a real child process.
#[derive(Clone, Debug)]
pub struct BlenderProcess {
    /// How long to block on output before checking liveness and cancellation.
    pub poll_interval: Duration,
    /// How long to keep draining output after the process exited.
    ///
    /// Bounds the wait when a grandchild inherited the pipe and keeps it open. The reader
    /// thread is then detached and stays blocked until that grandchild closes the pipe.
    pub drain_grace: Duration,
}

impl Default for BlenderProcess {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            drain_grace: Duration::from_secs(2),
        }
    }
}

impl BlenderProcess {
    /// Create a runner with default polling settings.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for BlenderProcess {
    #[tracing::instrument(skip_all, fields(start = job.range.start, end = job.range.end))]
    fn run_attempt(
        &mut self,
        job: &RenderJob,
        cancel: &CancelToken,
        on_line: &mut dyn FnMut(&str),
    ) -> KeeperResult<AttemptExit> {
        let (reader, writer) = std::io::pipe()
            .map_err(|e| KeeperError::launch(format!("failed to create output pipe: {e}")))?;
        let writer_err = writer
            .try_clone()
            .map_err(|e| KeeperError::launch(format!("failed to clone output pipe: {e}")))?;

        let mut cmd = job.command();
        cmd.stdin(Stdio::null()).stdout(writer).stderr(writer_err);
        tracing::debug!(command = ?cmd, "spawning renderer");

        let mut child = cmd.spawn().map_err(|e| {
            KeeperError::launch(format!(
                "failed to spawn '{}' (is it installed and on PATH?): {e}",
                job.renderer.display()
            ))
        })?;
        // The command still owns our copies of the write end; EOF needs them closed.
        drop(cmd);

        let (tx, rx) = mpsc::channel::<String>();
        let pump = std::thread::spawn(move || -> std::io::Result<()> {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                if reader.read_until(b'\n', &mut buf)? == 0 {
                    return Ok(());
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']).to_string();
                if tx.send(line).is_err() {
                    return Ok(());
                }
            }
        });

        let mut exited: Option<(ExitStatus, Instant)> = None;
        let mut stream_closed = false;
        let status = loop {
            if cancel.is_cancelled() {
                tracing::warn!("cancellation requested; stopping renderer");
                if let Err(e) = child.kill() {
                    tracing::debug!(error = %e, "kill failed (process already gone?)");
                }
                if let Err(e) = child.wait() {
                    tracing::debug!(error = %e, "wait after kill failed");
                }
                return Err(KeeperError::Cancelled);
            }

            // The output can close before the process exits; keep polling liveness then.
            if stream_closed {
                std::thread::sleep(self.poll_interval);
            } else {
                match rx.recv_timeout(self.poll_interval) {
                    Ok(line) => on_line(&line),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => stream_closed = true,
                }
            }

            if exited.is_none()
                && let Some(status) = child
                    .try_wait()
                    .map_err(|e| KeeperError::launch(format!("failed to poll renderer: {e}")))?
            {
                exited = Some((status, Instant::now()));
            }
            if let Some((status, at)) = exited {
                if stream_closed {
                    break status;
                }
                if at.elapsed() > self.drain_grace {
                    tracing::warn!(
                        "renderer exited but its output is still open; detaching the output reader"
                    );
                    break status;
                }
            }
        };

        if stream_closed {
            match pump.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "error reading renderer output"),
                Err(_) => tracing::warn!("renderer output reader panicked"),
            }
        }

        let exit = AttemptExit::from(status);
        tracing::debug!(%exit, "renderer exited");
        Ok(exit)
    }
}

#[cfg(test)]
#[path = "../tests/unit/process.rs"]
mod tests;
