//! Narration synthesis through the `edge-tts` command-line tool.

use super::{SpeechSynthesizer, Synthesis};
use crate::config::{ToolsConfig, TtsConfig};
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use slidecast_common::AudioClip;
use slidecast_av::runner::{expect_artifact, run_tool};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Friendly voice names mapped to Edge neural voices.
const VOICE_OPTIONS: &[(&str, &str)] = &[
    ("neutral_male", "en-US-GuyNeural"),
    ("neutral_female", "en-US-JennyNeural"),
    ("professional_male", "en-US-ChristopherNeural"),
    ("professional_female", "en-US-AriaNeural"),
    ("british_male", "en-GB-RyanNeural"),
    ("british_female", "en-GB-SoniaNeural"),
];

/// Longest text passed to the synthesizer in one request.
const MAX_TTS_CHARS: usize = 3000;

const TTS_TIMEOUT: Duration = Duration::from_secs(60);

pub struct EdgeTtsSynthesizer {
    tool: PathBuf,
    voice: String,
    rate: String,
    volume: String,
    min_chars: usize,
}

impl EdgeTtsSynthesizer {
    pub fn from_config(tts: &TtsConfig, tools: &ToolsConfig) -> Self {
        let tool = tools
            .edge_tts_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("edge-tts"));
        Self {
            tool,
            voice: resolve_voice(&tts.voice),
            rate: tts.rate.clone(),
            volume: tts.volume.clone(),
            min_chars: tts.min_text_chars,
        }
    }
}

/// Resolve a friendly voice name; a raw neural voice id passes through.
fn resolve_voice(name: &str) -> String {
    VOICE_OPTIONS
        .iter()
        .find(|(friendly, _)| *friendly == name)
        .map(|(_, neural)| neural.to_string())
        .unwrap_or_else(|| name.to_string())
}

fn markdown_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#{1,3}\s*").expect("markdown regex"))
}

/// Scrub text for speech: markdown markers, ligatures, smart punctuation,
/// unprintables, runaway whitespace, and excessive length.
fn clean_text_for_tts(text: &str) -> String {
    let text = markdown_regex().replace_all(text, "");
    let text = text
        .replace('\u{fb01}', "fi")
        .replace('\u{fb02}', "fl")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2013}', '\u{2014}'], "-");

    let text: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .collect();

    let mut cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() > MAX_TTS_CHARS {
        cleaned = cleaned.chars().take(MAX_TTS_CHARS).collect::<String>() + "...";
    }
    cleaned
}

#[async_trait]
impl SpeechSynthesizer for EdgeTtsSynthesizer {
    async fn synthesize(
        &self,
        slide_number: u32,
        text: &str,
        output: &Path,
    ) -> Result<Synthesis> {
        let clean = clean_text_for_tts(text);
        if clean.chars().count() < self.min_chars {
            return Ok(Synthesis::Skipped);
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // edge-tts reads its input from a file, keeping long narrations off
        // the command line.
        let mut text_file = tempfile::NamedTempFile::new()?;
        text_file.write_all(clean.as_bytes())?;

        let args = [
            "--voice".to_string(),
            self.voice.clone(),
            format!("--rate={}", self.rate),
            format!("--volume={}", self.volume),
            "--file".to_string(),
            text_file.path().to_string_lossy().to_string(),
            "--write-media".to_string(),
            output.to_string_lossy().to_string(),
        ];

        let run = run_tool(&self.tool, &args, Some(TTS_TIMEOUT)).await?;
        if !run.success() {
            anyhow::bail!(
                "edge-tts failed for slide {}: {}",
                slide_number,
                run.stderr_excerpt()
            );
        }
        expect_artifact(output)?;

        let word_count = clean.split_whitespace().count();
        Ok(Synthesis::Clip(AudioClip {
            slide_number,
            path: output.to_path_buf(),
            duration_secs: AudioClip::estimate_duration(word_count),
            word_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ToolsConfig, TtsConfig};

    fn synthesizer() -> EdgeTtsSynthesizer {
        EdgeTtsSynthesizer::from_config(&TtsConfig::default(), &ToolsConfig::default())
    }

    #[test]
    fn test_resolve_voice() {
        assert_eq!(resolve_voice("neutral_female"), "en-US-JennyNeural");
        assert_eq!(resolve_voice("british_male"), "en-GB-RyanNeural");
        // Raw voice ids pass through
        assert_eq!(resolve_voice("de-DE-KatjaNeural"), "de-DE-KatjaNeural");
    }

    #[test]
    fn test_clean_text_replacements() {
        let cleaned = clean_text_for_tts("## The \u{fb01}rst \u{2018}result\u{2019} \u{2013} good");
        assert_eq!(cleaned, "The first 'result' - good");
    }

    #[test]
    fn test_clean_text_caps_length() {
        let long = "word ".repeat(2000);
        let cleaned = clean_text_for_tts(&long);
        assert!(cleaned.chars().count() <= MAX_TTS_CHARS + 3);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text_for_tts("a\n\n  b\t c"), "a b c");
    }

    #[tokio::test]
    async fn test_short_text_skipped_without_tool() {
        // Below the minimum, the tool is never invoked, so this passes even
        // without edge-tts installed.
        let result = synthesizer()
            .synthesize(1, "hi", Path::new("/tmp/never_written.mp3"))
            .await
            .unwrap();
        assert_eq!(result, Synthesis::Skipped);
    }
}
