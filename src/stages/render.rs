//! Built-in slide image rendering.
//!
//! Renders each slide as a 1920x1080 PNG: flat background, a title band,
//! and one marker-plus-bar block per bullet whose bar length tracks the
//! bullet's text length. Glyph rasterization is a collaborator concern; a
//! production deployment swaps in a renderer that draws real text.

use super::SlideRenderer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use slidecast_common::Slide;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PngSlideRenderer {
    width: u32,
    height: u32,
    background: Rgb<u8>,
    band: Rgb<u8>,
    accent: Rgb<u8>,
    text: Rgb<u8>,
}

impl Default for PngSlideRenderer {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            background: Rgb([26, 26, 46]),
            band: Rgb([22, 33, 62]),
            accent: Rgb([78, 204, 163]),
            text: Rgb([232, 232, 232]),
        }
    }
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.put_pixel(px, py, color);
        }
    }
}

/// Bar length standing in for a run of text: proportional, clamped.
fn bar_width(text_len: usize, max_width: u32) -> u32 {
    ((text_len as u32) * 14).clamp(120, max_width)
}

impl PngSlideRenderer {
    fn render_slide(&self, slide: &Slide) -> RgbImage {
        let mut img = RgbImage::from_pixel(self.width, self.height, self.background);

        // Title band
        fill_rect(&mut img, 0, 0, self.width, 180, self.band);
        fill_rect(
            &mut img,
            80,
            70,
            bar_width(slide.title.len(), self.width - 160),
            48,
            self.text,
        );

        // Bullets
        let mut y = 280;
        for bullet in &slide.bullets {
            if y + 40 > self.height {
                break;
            }
            fill_rect(&mut img, 100, y + 8, 24, 24, self.accent);
            fill_rect(
                &mut img,
                160,
                y,
                bar_width(bullet.len(), self.width - 260),
                36,
                self.text,
            );
            y += 90;
        }

        // Slide number marker, bottom right
        fill_rect(&mut img, self.width - 120, self.height - 80, 40, 40, self.accent);

        img
    }
}

#[async_trait]
impl SlideRenderer for PngSlideRenderer {
    async fn render(&self, slides: &[Slide], out_dir: &Path) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(out_dir).await?;

        let renderer = self.clone();
        let slides = slides.to_vec();
        let out_dir = out_dir.to_path_buf();

        // Pixel pushing is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || {
            let mut paths = Vec::with_capacity(slides.len());
            for slide in &slides {
                let path = out_dir.join(format!("slide_{:02}.png", slide.number));
                let img = renderer.render_slide(slide);
                img.save(&path)
                    .with_context(|| format!("Failed to write slide image {:?}", path))?;
                paths.push(path);
            }
            Ok(paths)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(number: u32, bullets: usize) -> Slide {
        Slide {
            number,
            title: format!("Slide {}", number),
            bullets: (0..bullets).map(|i| format!("Bullet number {}", i)).collect(),
            narration: "n".into(),
            notes: None,
            visual_hint: None,
        }
    }

    #[test]
    fn test_bar_width_bounds() {
        assert_eq!(bar_width(0, 1000), 120);
        assert_eq!(bar_width(1000, 1000), 1000);
        assert!(bar_width(20, 1000) > 120);
    }

    #[tokio::test]
    async fn test_render_aligned_with_script() {
        let dir = tempfile::tempdir().unwrap();
        let slides = vec![slide(1, 2), slide(2, 12)];

        let paths = PngSlideRenderer::default()
            .render(&slides, dir.path())
            .await
            .unwrap();

        assert_eq!(paths.len(), slides.len());
        for path in &paths {
            assert!(path.exists());
            assert!(std::fs::metadata(path).unwrap().len() > 0);
        }
        assert!(paths[0].ends_with("slide_01.png"));
        assert!(paths[1].ends_with("slide_02.png"));
    }
}
