//! Pipeline stage seams and their built-in implementations.
//!
//! Each stage of the pipeline is a trait so the orchestrator can be driven
//! with scripted doubles in tests and so heavyweight collaborators (LLM
//! script generation, cloud TTS, realistic avatar synthesis) can be swapped
//! in without touching the run loop. The built-ins here are deliberately
//! modest: a plain-text parser, an offline outline generator, a geometric
//! PNG renderer, an edge-tts driver, and a static avatar card.

pub mod avatar;
pub mod parser;
pub mod render;
pub mod script;
pub mod tts;

pub use avatar::StaticAvatarRenderer;
pub use parser::TextDocumentParser;
pub use render::PngSlideRenderer;
pub use script::OutlineScriptGenerator;
pub use tts::EdgeTtsSynthesizer;

use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use slidecast_av::{ClipSource, OverlayPosition, Slideshow, VideoComposer};
use slidecast_common::{AudioClip, AvatarOption, InputKind, ParsedDocument, Slide, StylePreset};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extracts text, sections, and figures from an uploaded document.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(
        &self,
        input: &Path,
        kind: InputKind,
        workdir: &Path,
    ) -> Result<ParsedDocument>;
}

/// Turns parsed content into an ordered slide script.
#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(
        &self,
        doc: &ParsedDocument,
        style: StylePreset,
        title: &str,
    ) -> Result<Vec<Slide>>;
}

/// Renders slides to images, index-aligned with the input script.
#[async_trait]
pub trait SlideRenderer: Send + Sync {
    async fn render(&self, slides: &[Slide], out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Outcome of one narration synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub enum Synthesis {
    Clip(AudioClip),
    /// The text was too short to synthesize.
    Skipped,
}

/// Synthesizes narration audio for one slide.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, slide_number: u32, text: &str, output: &Path)
        -> Result<Synthesis>;
}

/// Produces a presenter avatar video of the requested duration.
#[async_trait]
pub trait AvatarRenderer: Send + Sync {
    async fn render(
        &self,
        option: AvatarOption,
        duration_secs: f64,
        output: &Path,
    ) -> Result<PathBuf>;
}

/// Composes the final video. Overlay placement and scale are the
/// implementation's configuration, not per-call arguments.
#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose_slideshow(
        &self,
        images: &[PathBuf],
        clips: &[ClipSource],
        output: &Path,
    ) -> Result<Slideshow>;

    async fn overlay_avatar(&self, main: &Path, avatar: &Path, output: &Path) -> Result<PathBuf>;
}

/// [`Composer`] backed by the real ffmpeg-driving [`VideoComposer`].
pub struct FfmpegComposer {
    inner: VideoComposer,
    position: OverlayPosition,
    scale: f64,
}

impl FfmpegComposer {
    pub fn new(inner: VideoComposer, position: OverlayPosition, scale: f64) -> Self {
        Self {
            inner,
            position,
            scale,
        }
    }
}

#[async_trait]
impl Composer for FfmpegComposer {
    async fn compose_slideshow(
        &self,
        images: &[PathBuf],
        clips: &[ClipSource],
        output: &Path,
    ) -> Result<Slideshow> {
        Ok(self.inner.compose_slideshow(images, clips, output).await?)
    }

    async fn overlay_avatar(&self, main: &Path, avatar: &Path, output: &Path) -> Result<PathBuf> {
        Ok(self
            .inner
            .overlay_avatar(main, avatar, output, self.position, self.scale)
            .await?)
    }
}

/// The full set of stage implementations the orchestrator drives.
#[derive(Clone)]
pub struct StageSet {
    pub parser: Arc<dyn DocumentParser>,
    pub script: Arc<dyn ScriptGenerator>,
    pub renderer: Arc<dyn SlideRenderer>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub avatar: Arc<dyn AvatarRenderer>,
    pub composer: Arc<dyn Composer>,
}

impl StageSet {
    /// Build the default stage set from configuration, resolving external
    /// tools once up front.
    pub fn from_config(config: &Config) -> Result<Self> {
        let ffmpeg = slidecast_av::tools::get_tool_path(
            "ffmpeg",
            config.tools.ffmpeg_path.as_deref(),
        )
        .context("ffmpeg is required")?;
        let ffprobe = slidecast_av::tools::get_tool_path(
            "ffprobe",
            config.tools.ffprobe_path.as_deref(),
        )
        .context("ffprobe is required")?;

        let composer = VideoComposer::with_tools(
            ffmpeg.clone(),
            ffprobe,
            config.composer.to_settings(),
        );
        let position: OverlayPosition = config
            .avatar
            .position
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;

        Ok(Self {
            parser: Arc::new(TextDocumentParser),
            script: Arc::new(OutlineScriptGenerator),
            renderer: Arc::new(PngSlideRenderer::default()),
            tts: Arc::new(EdgeTtsSynthesizer::from_config(&config.tts, &config.tools)),
            avatar: Arc::new(StaticAvatarRenderer::new(ffmpeg)),
            composer: Arc::new(FfmpegComposer::new(composer, position, config.avatar.scale)),
        })
    }
}
