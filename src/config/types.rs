use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration, passed explicitly into the orchestrator and
/// processor at construction. There is no ambient/global settings object.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub composer: ComposerConfig,

    #[serde(default)]
    pub avatar: AvatarConfig,

    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Where uploaded source documents are stored.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Root for per-job output directories.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./outputs")
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./slidecast.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
            db_path: default_db_path(),
        }
    }
}

/// Explicit tool paths, overriding PATH lookup when set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    #[serde(default)]
    pub ffprobe_path: Option<PathBuf>,

    #[serde(default)]
    pub edge_tts_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TtsConfig {
    /// Friendly voice name or a raw neural voice id.
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Speech rate adjustment, e.g. "-5%".
    #[serde(default = "default_rate")]
    pub rate: String,

    /// Volume adjustment, e.g. "+0%".
    #[serde(default = "default_volume")]
    pub volume: String,

    /// Narrations shorter than this many characters are skipped.
    #[serde(default = "default_min_chars")]
    pub min_text_chars: usize,
}

fn default_voice() -> String {
    "neutral_female".to_string()
}
fn default_rate() -> String {
    "-5%".to_string()
}
fn default_volume() -> String {
    "+0%".to_string()
}
fn default_min_chars() -> usize {
    5
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice: default_voice(),
            rate: default_rate(),
            volume: default_volume(),
            min_text_chars: default_min_chars(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComposerConfig {
    /// Duration of a slide segment with no narration.
    #[serde(default = "default_silent_secs")]
    pub silent_slide_secs: f64,

    /// Buffer added on top of the probed narration duration.
    #[serde(default = "default_buffer_secs")]
    pub audio_buffer_secs: f64,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Deadline for one segment encode, in seconds.
    #[serde(default = "default_segment_timeout")]
    pub segment_timeout_secs: u64,
}

fn default_silent_secs() -> f64 {
    5.0
}
fn default_buffer_secs() -> f64 {
    0.5
}
fn default_audio_bitrate() -> String {
    "192k".to_string()
}
fn default_segment_timeout() -> u64 {
    120
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            silent_slide_secs: default_silent_secs(),
            audio_buffer_secs: default_buffer_secs(),
            audio_bitrate: default_audio_bitrate(),
            segment_timeout_secs: default_segment_timeout(),
        }
    }
}

impl ComposerConfig {
    pub fn to_settings(&self) -> slidecast_av::ComposeSettings {
        slidecast_av::ComposeSettings {
            silent_slide_secs: self.silent_slide_secs,
            audio_buffer_secs: self.audio_buffer_secs,
            audio_bitrate: self.audio_bitrate.clone(),
            segment_timeout: std::time::Duration::from_secs(self.segment_timeout_secs),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AvatarConfig {
    /// Corner for the overlay: bottom-right, bottom-left, top-right, top-left.
    #[serde(default = "default_position")]
    pub position: String,

    /// Overlay size as a fraction of the avatar's own dimensions (0, 1].
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_position() -> String {
    "bottom-right".to_string()
}
fn default_scale() -> f64 {
    0.2
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            position: default_position(),
            scale: default_scale(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Number of concurrent pipeline workers.
    #[serde(default = "default_worker_count")]
    pub count: usize,

    /// Bound of the dispatch queue; pending jobs beyond it wait in the store.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// How often the dispatcher polls the store for pending jobs.
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
}

fn default_worker_count() -> usize {
    2
}
fn default_queue_depth() -> usize {
    16
}
fn default_poll_secs() -> u64 {
    2
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            queue_depth: default_queue_depth(),
            poll_interval_secs: default_poll_secs(),
        }
    }
}
