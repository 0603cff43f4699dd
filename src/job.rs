//! Render job description and the renderer-facing contracts around it.
//!
//! - [`RenderJob`] builds the Blender command line for one attempt.
//! - [`discover_frame_range`] asks Blender for the scene's frame range.
//! - [`OutputNaming`] derives a fresh output directory for a new job.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::foundation::core::FrameRange;
use crate::foundation::error::{KeeperError, KeeperResult};

/// Default renderer program, resolved through `PATH`.
pub const DEFAULT_RENDERER: &str = "blender";

/// One supervised rendering job.
///
/// `range.start` is the only field changed after construction: the supervisor advances it
/// past the frames that survived a crashed attempt.
#[derive(Clone, Debug)]
pub struct RenderJob {
    /// Renderer program to launch.
    pub renderer: PathBuf,
    /// Project file handed to the renderer.
    pub input_path: PathBuf,
    /// Directory receiving one `<frame>.<ext>` artifact per rendered frame.
    pub output_dir: PathBuf,
    /// Frames still to be rendered by the next attempt.
    pub range: FrameRange,
    /// Render the whole range in one invocation (`-a`) instead of a single frame.
    pub animate: bool,
}

impl RenderJob {
    /// Create an animation job using the default renderer.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        range: FrameRange,
    ) -> Self {
        Self {
            renderer: PathBuf::from(DEFAULT_RENDERER),
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            range,
            animate: true,
        }
    }

    /// Replace the renderer program.
    pub fn with_renderer(mut self, renderer: impl Into<PathBuf>) -> Self {
        self.renderer = renderer.into();
        self
    }

    /// Value passed to `--render-output`.
    ///
    /// Always ends with a path separator so Blender writes `<frame>.<ext>` inside the
    /// directory instead of using the last component as a file name prefix.
    pub fn render_output_arg(&self) -> PathBuf {
        self.output_dir.join("")
    }

    /// Renderer arguments for the current state of the job.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-b".into(), self.input_path.clone().into()];
        args.push("--frame-start".into());
        args.push(self.range.start.to_string().into());
        args.push("--frame-end".into());
        args.push(self.range.end.to_string().into());
        args.push("--render-output".into());
        args.push(self.render_output_arg().into());
        if self.animate {
            args.push("-a".into());
        }
        args
    }

    /// A ready-to-configure [`Command`] for the current state of the job.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.renderer);
        cmd.args(self.args());
        cmd
    }
}

// Printed by Blender's embedded Python; parsed back by `parse_frame_range`.
const RANGE_SCRIPT: &str = "import bpy; s = bpy.context.scene; \
print(f'start_frame={s.frame_start}'); print(f'end_frame={s.frame_end}')";

/// Ask the renderer for the scene frame range of `input_path`.
///
/// Any failure is a [`KeeperError::Discovery`]: no job can be built without a range.
#[tracing::instrument(skip_all, fields(input = %input_path.display()))]
pub fn discover_frame_range(renderer: &Path, input_path: &Path) -> KeeperResult<FrameRange> {
    let output = Command::new(renderer)
        .arg("-b")
        .arg(input_path)
        .args(["--python-expr", RANGE_SCRIPT])
        .output()
        .map_err(|e| {
            KeeperError::discovery(format!(
                "failed to run '{}' (is it installed and on PATH?): {e}",
                renderer.display()
            ))
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push('\n');
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    for line in text.lines() {
        tracing::trace!(line, "discovery output");
    }

    if !output.status.success() {
        return Err(KeeperError::discovery(format!(
            "'{}' exited with status {} while reading frames of '{}'",
            renderer.display(),
            output.status,
            input_path.display()
        )));
    }

    let range = parse_frame_range(&text)?;
    tracing::info!(start = range.start, end = range.end, "discovered frame range");
    Ok(range)
}

/// Extract `start_frame=<int>` and `end_frame=<int>` from renderer output.
///
/// Marker order does not matter, other lines are ignored and the first occurrence of each
/// marker wins.
pub fn parse_frame_range(output: &str) -> KeeperResult<FrameRange> {
    let mut start = None;
    let mut end = None;
    for line in output.lines().map(str::trim) {
        if start.is_none()
            && let Some(v) = line.strip_prefix("start_frame=")
        {
            start = Some(parse_marker("start_frame", v)?);
        } else if end.is_none()
            && let Some(v) = line.strip_prefix("end_frame=")
        {
            end = Some(parse_marker("end_frame", v)?);
        }
    }

    match (start, end) {
        (Some(start), Some(end)) => FrameRange::new(start, end)
            .map_err(|e| KeeperError::discovery(format!("unusable frame range: {e}"))),
        _ => Err(KeeperError::discovery(
            "unable to find start_frame/end_frame in renderer output",
        )),
    }
}

fn parse_marker(name: &str, value: &str) -> KeeperResult<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| KeeperError::discovery(format!("{name} is not a frame number: '{value}'")))
}

/// Naming scheme for fresh output directories: `<render_root>/<stem>_<YYYYmmdd-HHMMSS>`.
#[derive(Clone, Debug)]
pub struct OutputNaming {
    /// Directory under which per-job output directories are created.
    pub render_root: PathBuf,
    /// Timestamp appended to every directory created by this run.
    pub started_at: chrono::NaiveDateTime,
}

impl OutputNaming {
    /// Naming rooted at `render_root`, stamped with the current local time.
    pub fn new(render_root: impl Into<PathBuf>) -> Self {
        Self {
            render_root: render_root.into(),
            started_at: chrono::Local::now().naive_local(),
        }
    }

    /// Replace the timestamp.
    pub fn with_started_at(mut self, started_at: chrono::NaiveDateTime) -> Self {
        self.started_at = started_at;
        self
    }

    /// Output directory for `input_path`.
    pub fn dir_for(&self, input_path: &Path) -> PathBuf {
        let stem = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "render".to_string());
        let stamp = self.started_at.format("%Y%m%d-%H%M%S");
        self.render_root.join(format!("{stem}_{stamp}"))
    }
}

#[cfg(test)]
#[path = "../tests/unit/job.rs"]
mod tests;
