//! FFprobe-based duration probing.

use crate::runner::run_tool;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe the container duration of a media file in seconds.
///
/// Estimated durations drift; anything user-facing must come from this
/// probe of the real artifact, not from summed segment estimates.
pub async fn probe_duration(ffprobe: &Path, media: &Path) -> Result<f64> {
    crate::runner::expect_input(media)?;

    let media_arg = media.to_string_lossy();
    let output = run_tool(
        ffprobe,
        &[
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "json",
            media_arg.as_ref(),
        ],
        Some(Duration::from_secs(30)),
    )
    .await?;

    if !output.success() {
        return Err(Error::tool_failed("ffprobe", output.stderr_excerpt()));
    }

    let parsed: FfprobeOutput = serde_json::from_str(&output.stdout)?;

    parsed
        .format
        .duration
        .as_deref()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| Error::parse_error("ffprobe", "no duration in format section"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ffprobe_json() {
        let json = r#"{"format": {"duration": "12.345000"}}"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.format.duration.as_deref(), Some("12.345000"));
    }

    #[test]
    fn test_parse_ffprobe_json_no_duration() {
        let json = r#"{"format": {}}"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert!(parsed.format.duration.is_none());
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let result = probe_duration(Path::new("ffprobe"), Path::new("/nonexistent.mp3")).await;
        assert!(matches!(result, Err(Error::MissingInput { .. })));
    }
}
