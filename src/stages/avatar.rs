//! Built-in presenter avatar rendering.
//!
//! Draws a simple-graphic avatar card (a head-and-shoulders figure built
//! from filled circles) and loops it into a video of the requested duration
//! with ffmpeg. Realistic avatars require an external synthesis service and
//! are reported as unsupported; the orchestrator treats that as a soft
//! failure.

use super::AvatarRenderer;
use anyhow::Result;
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use slidecast_av::runner::{expect_artifact, run_tool};
use slidecast_common::AvatarOption;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CARD_SIZE: u32 = 400;
const ENCODE_TIMEOUT: Duration = Duration::from_secs(120);

pub struct StaticAvatarRenderer {
    ffmpeg: PathBuf,
}

impl StaticAvatarRenderer {
    pub fn new(ffmpeg: PathBuf) -> Self {
        Self { ffmpeg }
    }
}

fn fill_circle(img: &mut RgbImage, cx: i64, cy: i64, r: i64, color: Rgb<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for y in (cy - r).max(0)..(cy + r).min(h) {
        for x in (cx - r).max(0)..(cx + r).min(w) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= r * r {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// The avatar card: backdrop disc, shoulders, face, eyes, mouth.
fn render_card() -> RgbImage {
    let size = CARD_SIZE as i64;
    let mut img = RgbImage::from_pixel(CARD_SIZE, CARD_SIZE, Rgb([15, 15, 15]));

    fill_circle(&mut img, size / 2, size / 2, size / 2 - 8, Rgb([44, 62, 80]));
    fill_circle(&mut img, size / 2, size, size / 3, Rgb([52, 73, 94])); // shoulders
    fill_circle(&mut img, size / 2, size / 2 - 20, size / 4, Rgb([232, 190, 172])); // face
    fill_circle(&mut img, size / 2 - 35, size / 2 - 40, 10, Rgb([45, 31, 21])); // eyes
    fill_circle(&mut img, size / 2 + 35, size / 2 - 40, 10, Rgb([45, 31, 21]));
    fill_circle(&mut img, size / 2, size / 2 + 35, 16, Rgb([140, 60, 60])); // mouth

    img
}

#[async_trait]
impl AvatarRenderer for StaticAvatarRenderer {
    async fn render(
        &self,
        option: AvatarOption,
        duration_secs: f64,
        output: &Path,
    ) -> Result<PathBuf> {
        match option {
            AvatarOption::SimpleGraphic => {}
            AvatarOption::None => anyhow::bail!("avatar rendering requested with option 'none'"),
            AvatarOption::Realistic => anyhow::bail!(
                "realistic avatar synthesis requires an external service and is not available"
            ),
        }
        if duration_secs <= 0.0 {
            anyhow::bail!("avatar duration must be positive, got {}", duration_secs);
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let card_path = output.with_extension("png");
        let card = tokio::task::spawn_blocking(render_card).await?;
        card.save(&card_path)?;

        let args = [
            "-y".to_string(),
            "-loop".to_string(),
            "1".to_string(),
            "-i".to_string(),
            card_path.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-t".to_string(),
            format!("{:.3}", duration_secs),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-an".to_string(),
            output.to_string_lossy().to_string(),
        ];

        let run = run_tool(&self.ffmpeg, &args, Some(ENCODE_TIMEOUT)).await?;
        if !run.success() {
            anyhow::bail!("avatar encode failed: {}", run.stderr_excerpt());
        }
        expect_artifact(output)?;

        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_card_dimensions() {
        let card = render_card();
        assert_eq!(card.dimensions(), (CARD_SIZE, CARD_SIZE));
        // The face must differ from the backdrop
        let face = card.get_pixel(CARD_SIZE / 2, CARD_SIZE / 2 - 20);
        let corner = card.get_pixel(2, 2);
        assert_ne!(face, corner);
    }

    #[tokio::test]
    async fn test_none_option_rejected() {
        let renderer = StaticAvatarRenderer::new(PathBuf::from("ffmpeg"));
        let dir = tempfile::tempdir().unwrap();
        let result = renderer
            .render(AvatarOption::None, 10.0, &dir.path().join("avatar.mp4"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_realistic_unsupported() {
        let renderer = StaticAvatarRenderer::new(PathBuf::from("ffmpeg"));
        let dir = tempfile::tempdir().unwrap();
        let err = renderer
            .render(AvatarOption::Realistic, 10.0, &dir.path().join("avatar.mp4"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("external service"));
    }
}
