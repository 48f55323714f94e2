//! Slideshow composition.
//!
//! Turns an ordered list of slide images and a set of narration clips into
//! one concatenated video, then optionally composites an avatar video into
//! a corner. Clips address slides by slide number, not list position; a
//! slide without a usable clip becomes a fixed-duration silent segment.
//!
//! Per-slide encode failures drop that slide and the composition continues;
//! only an empty result is fatal. All intermediate segments live in a
//! temporary directory that is removed whether composition succeeds or not.

use crate::probe::probe_duration;
use crate::runner::{absolute, expect_artifact, expect_input, run_tool};
use crate::tools::require_tool;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Fallback duration when neither probe nor estimate is available.
const DEFAULT_AUDIO_SECS: f64 = 30.0;

/// Corner of the frame where an overlay is composited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPosition {
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl OverlayPosition {
    /// FFmpeg overlay coordinate expression with the given pixel margin.
    fn expression(self, margin: u32) -> String {
        match self {
            Self::BottomRight => format!("main_w-overlay_w-{m}:main_h-overlay_h-{m}", m = margin),
            Self::BottomLeft => format!("{m}:main_h-overlay_h-{m}", m = margin),
            Self::TopRight => format!("main_w-overlay_w-{m}:{m}", m = margin),
            Self::TopLeft => format!("{m}:{m}", m = margin),
        }
    }
}

impl std::str::FromStr for OverlayPosition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "bottom-right" => Ok(Self::BottomRight),
            "bottom-left" => Ok(Self::BottomLeft),
            "top-right" => Ok(Self::TopRight),
            "top-left" => Ok(Self::TopLeft),
            _ => Err(format!("Unknown overlay position: {}", s)),
        }
    }
}

/// Composition settings.
#[derive(Debug, Clone)]
pub struct ComposeSettings {
    /// Duration of a segment for a slide with no usable narration.
    pub silent_slide_secs: f64,
    /// Buffer added on top of the probed narration duration.
    pub audio_buffer_secs: f64,
    /// AAC bitrate for segment audio.
    pub audio_bitrate: String,
    /// Deadline for a single segment encode. Concatenation is unbounded.
    pub segment_timeout: Duration,
    /// Pixel margin between the overlay and the frame edge.
    pub overlay_margin_px: u32,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            silent_slide_secs: 5.0,
            audio_buffer_secs: 0.5,
            audio_bitrate: "192k".to_string(),
            segment_timeout: Duration::from_secs(120),
            overlay_margin_px: 20,
        }
    }
}

/// A narration clip offered to the composer.
#[derive(Debug, Clone)]
pub struct ClipSource {
    /// 1-based slide number the clip narrates.
    pub slide_number: u32,
    pub path: PathBuf,
    /// Word-count estimate; used only if the probe fails.
    pub estimated_duration_secs: Option<f64>,
}

/// A successfully composed slideshow.
#[derive(Debug, Clone, PartialEq)]
pub struct Slideshow {
    pub path: PathBuf,
    /// Probed from the final artifact, not summed from estimates.
    pub duration_secs: f64,
    pub segment_count: usize,
}

/// Composes slide images and narration clips into a single video.
pub struct VideoComposer {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    settings: ComposeSettings,
}

impl VideoComposer {
    /// Create a composer, resolving ffmpeg and ffprobe from PATH.
    pub fn new(settings: ComposeSettings) -> Result<Self> {
        Ok(Self {
            ffmpeg: require_tool("ffmpeg")?,
            ffprobe: require_tool("ffprobe")?,
            settings,
        })
    }

    /// Create a composer with explicit tool paths.
    pub fn with_tools(ffmpeg: PathBuf, ffprobe: PathBuf, settings: ComposeSettings) -> Self {
        Self {
            ffmpeg,
            ffprobe,
            settings,
        }
    }

    /// Compose a slideshow video from images and narration clips.
    ///
    /// Returns the output path, its probed duration, and how many slides
    /// made it into the final sequence. Fails with
    /// [`Error::NoSegments`] when no segment could be produced at all.
    pub async fn compose_slideshow(
        &self,
        images: &[PathBuf],
        clips: &[ClipSource],
        output: &Path,
    ) -> Result<Slideshow> {
        if images.is_empty() {
            return Err(Error::NoSegments);
        }

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Intermediates live next to the output and vanish with this guard,
        // success or failure.
        let workdir = match output.parent() {
            Some(parent) => TempDir::new_in(parent)?,
            None => TempDir::new()?,
        };

        let clip_index = index_clips(clips);
        let mut segments: Vec<PathBuf> = Vec::new();

        for (i, image) in images.iter().enumerate() {
            let slide_number = (i + 1) as u32;
            let segment = workdir.path().join(format!("segment_{:02}.mp4", i));

            // A clip is usable only if it exists on disk and is non-empty;
            // anything else demotes the slide to a silent segment.
            let audio = clip_index.get(&slide_number).and_then(|clip| {
                match expect_input(&clip.path) {
                    Ok(_) => Some(*clip),
                    Err(e) => {
                        warn!("Slide {}: unusable narration clip: {}", slide_number, e);
                        None
                    }
                }
            });

            let result = match audio {
                Some(clip) => self.encode_narrated_segment(image, clip, &segment).await,
                None => self.encode_silent_segment(image, &segment).await,
            };

            match result {
                Ok(()) => segments.push(segment),
                Err(e) => {
                    warn!("Slide {}: segment dropped: {}", slide_number, e);
                }
            }
        }

        if segments.is_empty() {
            return Err(Error::NoSegments);
        }

        self.concatenate(&segments, workdir.path(), output).await?;
        expect_artifact(output)?;

        let duration_secs = probe_duration(&self.ffprobe, output).await?;

        info!(
            "Composed {} of {} slides into {} ({:.1}s)",
            segments.len(),
            images.len(),
            output.display(),
            duration_secs
        );

        Ok(Slideshow {
            path: output.to_path_buf(),
            duration_secs,
            segment_count: segments.len(),
        })
    }

    /// Composite an avatar video into a corner of the main video.
    ///
    /// The avatar is scaled to `scale` of its own dimensions and the main
    /// audio track is passed through untouched.
    pub async fn overlay_avatar(
        &self,
        main_video: &Path,
        avatar_video: &Path,
        output: &Path,
        position: OverlayPosition,
        scale: f64,
    ) -> Result<PathBuf> {
        if !(0.0..=1.0).contains(&scale) || scale == 0.0 {
            return Err(Error::InvalidInput(format!(
                "overlay scale must be in (0, 1], got {}",
                scale
            )));
        }
        expect_input(main_video)?;
        expect_input(avatar_video)?;

        let args = overlay_args(
            main_video,
            avatar_video,
            output,
            position,
            scale,
            self.settings.overlay_margin_px,
        );

        let run = run_tool(&self.ffmpeg, &args, None).await?;
        if !run.success() {
            return Err(Error::tool_failed("ffmpeg", run.stderr_excerpt()));
        }
        expect_artifact(output)?;

        Ok(output.to_path_buf())
    }

    async fn encode_narrated_segment(
        &self,
        image: &Path,
        clip: &ClipSource,
        output: &Path,
    ) -> Result<()> {
        expect_input(image)?;

        let duration = match probe_duration(&self.ffprobe, &clip.path).await {
            Ok(d) => d,
            Err(e) => {
                let fallback = clip.estimated_duration_secs.unwrap_or(DEFAULT_AUDIO_SECS);
                debug!(
                    "Probe failed for {} ({}); using estimate {:.1}s",
                    clip.path.display(),
                    e,
                    fallback
                );
                fallback
            }
        };

        let args = narrated_segment_args(
            image,
            &clip.path,
            duration + self.settings.audio_buffer_secs,
            &self.settings.audio_bitrate,
            output,
        );

        let run = run_tool(&self.ffmpeg, &args, Some(self.settings.segment_timeout)).await?;
        if !run.success() {
            return Err(Error::tool_failed("ffmpeg", run.stderr_excerpt()));
        }
        expect_artifact(output)?;
        Ok(())
    }

    async fn encode_silent_segment(&self, image: &Path, output: &Path) -> Result<()> {
        expect_input(image)?;

        let args = silent_segment_args(image, self.settings.silent_slide_secs, output);

        let run = run_tool(&self.ffmpeg, &args, Some(self.settings.segment_timeout)).await?;
        if !run.success() {
            return Err(Error::tool_failed("ffmpeg", run.stderr_excerpt()));
        }
        expect_artifact(output)?;
        Ok(())
    }

    /// Concatenate segments in order through a re-encode pass. Stream copy
    /// is unsafe here: segments may disagree on encoding parameters.
    async fn concatenate(&self, segments: &[PathBuf], workdir: &Path, output: &Path) -> Result<()> {
        let list_path = workdir.join("concat.txt");
        std::fs::write(&list_path, concat_list(segments))?;

        let args = concat_args(&list_path, output);

        let run = run_tool(&self.ffmpeg, &args, None).await?;
        if !run.success() {
            return Err(Error::tool_failed("ffmpeg", run.stderr_excerpt()));
        }
        Ok(())
    }
}

/// Index clips by slide number; a later clip for the same slide wins.
fn index_clips(clips: &[ClipSource]) -> HashMap<u32, &ClipSource> {
    let mut index = HashMap::new();
    for clip in clips {
        index.insert(clip.slide_number, clip);
    }
    index
}

/// Concat demuxer list file contents: absolute paths, single quotes escaped.
fn concat_list(segments: &[PathBuf]) -> String {
    let mut list = String::new();
    for segment in segments {
        let path = absolute(segment).display().to_string().replace('\'', "'\\''");
        list.push_str(&format!("file '{}'\n", path));
    }
    list
}

fn narrated_segment_args(
    image: &Path,
    audio: &Path,
    duration_secs: f64,
    audio_bitrate: &str,
    output: &Path,
) -> Vec<String> {
    vec![
        "-y".into(),
        "-loop".into(),
        "1".into(),
        "-i".into(),
        image.to_string_lossy().into(),
        "-i".into(),
        audio.to_string_lossy().into(),
        "-c:v".into(),
        "libx264".into(),
        "-tune".into(),
        "stillimage".into(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        audio_bitrate.into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-shortest".into(),
        "-t".into(),
        format!("{:.3}", duration_secs),
        output.to_string_lossy().into(),
    ]
}

fn silent_segment_args(image: &Path, duration_secs: f64, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-loop".into(),
        "1".into(),
        "-i".into(),
        image.to_string_lossy().into(),
        "-c:v".into(),
        "libx264".into(),
        "-tune".into(),
        "stillimage".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-t".into(),
        format!("{:.3}", duration_secs),
        "-an".into(),
        output.to_string_lossy().into(),
    ]
}

fn concat_args(list_path: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_path.to_string_lossy().into(),
        "-c:v".into(),
        "libx264".into(),
        "-c:a".into(),
        "aac".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-movflags".into(),
        "+faststart".into(),
        output.to_string_lossy().into(),
    ]
}

fn overlay_args(
    main_video: &Path,
    avatar_video: &Path,
    output: &Path,
    position: OverlayPosition,
    scale: f64,
    margin: u32,
) -> Vec<String> {
    let filter = format!(
        "[1:v]scale=iw*{s}:ih*{s}[pip];[0:v][pip]overlay={pos}",
        s = scale,
        pos = position.expression(margin)
    );
    vec![
        "-y".into(),
        "-i".into(),
        main_video.to_string_lossy().into(),
        "-i".into(),
        avatar_video.to_string_lossy().into(),
        "-filter_complex".into(),
        filter,
        "-c:a".into(),
        "copy".into(),
        output.to_string_lossy().into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_composer() -> VideoComposer {
        // Tool paths are never invoked by these tests
        VideoComposer::with_tools(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
            ComposeSettings::default(),
        )
    }

    #[test]
    fn test_default_settings() {
        let settings = ComposeSettings::default();
        assert_eq!(settings.silent_slide_secs, 5.0);
        assert_eq!(settings.audio_buffer_secs, 0.5);
        assert_eq!(settings.audio_bitrate, "192k");
        assert_eq!(settings.segment_timeout, Duration::from_secs(120));
        assert_eq!(settings.overlay_margin_px, 20);
    }

    #[test]
    fn test_overlay_expressions() {
        assert_eq!(
            OverlayPosition::BottomRight.expression(20),
            "main_w-overlay_w-20:main_h-overlay_h-20"
        );
        assert_eq!(
            OverlayPosition::BottomLeft.expression(20),
            "20:main_h-overlay_h-20"
        );
        assert_eq!(OverlayPosition::TopRight.expression(20), "main_w-overlay_w-20:20");
        assert_eq!(OverlayPosition::TopLeft.expression(20), "20:20");
    }

    #[test]
    fn test_overlay_position_parse() {
        assert_eq!(
            "bottom-right".parse::<OverlayPosition>().unwrap(),
            OverlayPosition::BottomRight
        );
        assert!("center".parse::<OverlayPosition>().is_err());
    }

    #[test]
    fn test_index_clips_by_slide_number() {
        let clips = vec![
            ClipSource {
                slide_number: 3,
                path: "/a/three.mp3".into(),
                estimated_duration_secs: None,
            },
            ClipSource {
                slide_number: 1,
                path: "/a/one.mp3".into(),
                estimated_duration_secs: None,
            },
        ];
        let index = index_clips(&clips);
        // Keyed by slide number, not list position
        assert_eq!(index.get(&1).unwrap().path, PathBuf::from("/a/one.mp3"));
        assert_eq!(index.get(&3).unwrap().path, PathBuf::from("/a/three.mp3"));
        assert!(index.get(&2).is_none());
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/tmp/it's here/segment_00.mp4")]);
        assert_eq!(list, "file '/tmp/it'\\''s here/segment_00.mp4'\n");
    }

    #[test]
    fn test_narrated_segment_args_add_buffer_upstream() {
        let args = narrated_segment_args(
            Path::new("/s/slide.png"),
            Path::new("/a/clip.mp3"),
            10.5,
            "192k",
            Path::new("/t/out.mp4"),
        );
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"10.500".to_string()));
        assert!(args.contains(&"stillimage".to_string()));
        assert!(!args.contains(&"-an".to_string()));
    }

    #[test]
    fn test_silent_segment_args_have_no_audio() {
        let args = silent_segment_args(Path::new("/s/slide.png"), 5.0, Path::new("/t/out.mp4"));
        assert!(args.contains(&"-an".to_string()));
        assert!(args.contains(&"5.000".to_string()));
    }

    #[test]
    fn test_concat_args_reencode() {
        let args = concat_args(Path::new("/t/concat.txt"), Path::new("/t/out.mp4"));
        // Re-encode pass, not stream copy
        assert!(args.contains(&"libx264".to_string()));
        assert!(!args.contains(&"copy".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
    }

    #[test]
    fn test_overlay_args_pass_audio_through() {
        let args = overlay_args(
            Path::new("/t/main.mp4"),
            Path::new("/t/avatar.mp4"),
            Path::new("/t/out.mp4"),
            OverlayPosition::BottomRight,
            0.2,
            20,
        );
        let filter = args
            .iter()
            .find(|a| a.contains("overlay="))
            .expect("filter_complex present");
        assert!(filter.contains("scale=iw*0.2:ih*0.2"));
        assert!(filter.contains("main_w-overlay_w-20:main_h-overlay_h-20"));
        // Audio from the main video is copied, not re-encoded
        let copy_pos = args.iter().position(|a| a == "copy").unwrap();
        assert_eq!(args[copy_pos - 1], "-c:a");
    }

    #[tokio::test]
    async fn test_compose_no_images_fails() {
        let composer = test_composer();
        let out = tempfile::tempdir().unwrap();
        let result = composer
            .compose_slideshow(&[], &[], &out.path().join("out.mp4"))
            .await;
        assert!(matches!(result, Err(Error::NoSegments)));
    }

    #[tokio::test]
    async fn test_compose_all_units_dropped_fails() {
        // Every image is missing, so every unit is dropped before any tool
        // invocation; the composition must fail with the canonical message.
        let composer = test_composer();
        let out = tempfile::tempdir().unwrap();
        let images = vec![
            PathBuf::from("/nonexistent/slide_01.png"),
            PathBuf::from("/nonexistent/slide_02.png"),
        ];
        let result = composer
            .compose_slideshow(&images, &[], &out.path().join("out.mp4"))
            .await;
        match result {
            Err(e) => assert_eq!(e.to_string(), "no slide videos created"),
            Ok(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_overlay_rejects_bad_scale() {
        let composer = test_composer();
        let result = composer
            .overlay_avatar(
                Path::new("/t/main.mp4"),
                Path::new("/t/avatar.mp4"),
                Path::new("/t/out.mp4"),
                OverlayPosition::TopLeft,
                1.5,
            )
            .await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_overlay_missing_main_is_input_fault() {
        let composer = test_composer();
        let result = composer
            .overlay_avatar(
                Path::new("/nonexistent/main.mp4"),
                Path::new("/nonexistent/avatar.mp4"),
                Path::new("/t/out.mp4"),
                OverlayPosition::TopLeft,
                0.2,
            )
            .await;
        assert!(result.as_ref().err().map(|e| e.is_input_fault()).unwrap_or(false));
    }
}
