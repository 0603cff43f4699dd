//! framekeeper supervises long Blender animation renders.
//!
//! Blender renders an animation frame by frame and occasionally dies halfway through. The
//! supervisor relaunches it from the first frame that has no artifact on disk yet, up to a
//! retry budget, and condenses Blender's chatty output into heartbeats and per-frame
//! summaries:
//!
//! - Discover the scene range with [`discover_frame_range`]
//! - Describe the job with a [`RenderJob`]
//! - Drive it with a [`Supervisor`] over a [`BlenderProcess`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub mod classify;
pub mod job;
pub mod process;
pub mod scan;
pub mod supervise;

pub use crate::foundation::core::{CancelToken, FrameRange};
pub use crate::foundation::error::{KeeperError, KeeperResult};

pub use crate::classify::{LineClassifier, ProgressEvent};
pub use crate::job::{OutputNaming, RenderJob, discover_frame_range, parse_frame_range};
pub use crate::process::{AttemptExit, BlenderProcess, Renderer};
pub use crate::scan::{FrameSet, scan_completed_frames};
pub use crate::supervise::{Phase, RenderSummary, Supervisor, SupervisorOpts, Verdict};
