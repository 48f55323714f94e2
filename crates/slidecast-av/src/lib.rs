//! Slidecast-AV: FFmpeg process supervision and slideshow composition.
//!
//! This crate drives the external media tools (ffmpeg, ffprobe) through
//! their command-line interfaces:
//!
//! - **Runner**: bounded-timeout subprocess execution with null stdin and
//!   captured output, plus artifact existence/size verification
//! - **Probe**: duration probing of audio and video files via ffprobe
//! - **Compose**: turning slide images and narration clips into per-slide
//!   segments, concatenating them, and compositing an avatar overlay
//! - **Tools**: detection of required external tools
//!
//! The crate deliberately knows nothing about jobs or persistence; callers
//! hand it file paths and get file paths (or a classified error) back.

pub mod compose;
pub mod error;
pub mod probe;
pub mod runner;
pub mod tools;

pub use compose::{ClipSource, ComposeSettings, OverlayPosition, Slideshow, VideoComposer};
pub use error::{Error, Result};
pub use probe::probe_duration;
pub use runner::{expect_artifact, expect_input, run_tool, RunOutput};
pub use tools::{check_tool, check_tools, require_tool, ToolInfo};
