//! Core type definitions for jobs, slides, and narration clips.
//!
//! This module defines the enums describing a job's input and rendering
//! preferences, plus the slide-script and audio-clip records that pipeline
//! stages hand to each other. All enums serialize in kebab-case, matching
//! the strings persisted in the job store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Kind of uploaded input, detected from the file extension at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputKind {
    /// A prose document (PDF, Word, plain text, Markdown).
    Document,
    /// A zip of pre-rendered slide images.
    ImageZip,
    /// An existing slide deck (PowerPoint).
    Presentation,
    /// A LaTeX paper archive (zip or .tex).
    PaperArchive,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::ImageZip => write!(f, "image-zip"),
            Self::Presentation => write!(f, "presentation"),
            Self::PaperArchive => write!(f, "paper-archive"),
        }
    }
}

impl std::str::FromStr for InputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(Self::Document),
            "image-zip" => Ok(Self::ImageZip),
            "presentation" => Ok(Self::Presentation),
            "paper-archive" => Ok(Self::PaperArchive),
            _ => Err(format!("Unknown input kind: {}", s)),
        }
    }
}

/// Presentation style preset controlling slide count and narration depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    /// High-level overview, fewer slides, key points only.
    Concise,
    /// Comprehensive explanation, more slides and longer narration.
    Detailed,
}

impl StylePreset {
    /// Maximum number of content slides for this style.
    pub fn max_slides(self) -> usize {
        match self {
            Self::Concise => 8,
            Self::Detailed => 12,
        }
    }

    /// Maximum bullet points per slide for this style.
    pub fn max_bullets(self) -> usize {
        match self {
            Self::Concise => 4,
            Self::Detailed => 6,
        }
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concise => write!(f, "concise"),
            Self::Detailed => write!(f, "detailed"),
        }
    }
}

impl std::str::FromStr for StylePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "concise" => Ok(Self::Concise),
            "detailed" => Ok(Self::Detailed),
            _ => Err(format!("Unknown style preset: {}", s)),
        }
    }
}

/// Presenter avatar overlay option for the final video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvatarOption {
    /// No avatar overlay.
    None,
    /// Simple rendered graphic avatar.
    SimpleGraphic,
    /// Photorealistic avatar (requires an external synthesis service).
    Realistic,
}

impl fmt::Display for AvatarOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::SimpleGraphic => write!(f, "simple-graphic"),
            Self::Realistic => write!(f, "realistic"),
        }
    }
}

impl std::str::FromStr for AvatarOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "simple-graphic" => Ok(Self::SimpleGraphic),
            "realistic" => Ok(Self::Realistic),
            _ => Err(format!("Unknown avatar option: {}", s)),
        }
    }
}

/// One section extracted from a source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub content: String,
}

/// Content extracted from an uploaded document by the parser stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ParsedDocument {
    /// Full extracted text.
    pub text: String,
    /// Sections detected in the text, in document order.
    pub sections: Vec<Section>,
    /// Paths of extracted figure images.
    pub figures: Vec<PathBuf>,
}

/// One slide of the generated presentation script.
///
/// `number` is 1-based and matches presentation order; audio clips reference
/// slides by this number, never by list position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slide {
    pub number: u32,
    pub title: String,
    pub bullets: Vec<String>,
    /// Narration text fed to the speech synthesizer. The orchestrator
    /// backfills a sentence from title and bullets when a generator leaves
    /// this empty.
    pub narration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Advisory suggestion for a figure; unused by composition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_hint: Option<String>,
}

/// A synthesized narration clip for one slide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioClip {
    /// 1-based slide number this clip narrates.
    pub slide_number: u32,
    pub path: PathBuf,
    /// Estimated from word count at ~150 words/minute when the exact
    /// duration is unavailable; the composer probes the real duration
    /// before encoding.
    pub duration_secs: f64,
    pub word_count: usize,
}

impl AudioClip {
    /// Estimate spoken duration of a word count at ~150 words/minute.
    pub fn estimate_duration(word_count: usize) -> f64 {
        (word_count as f64 / 150.0) * 60.0
    }
}
