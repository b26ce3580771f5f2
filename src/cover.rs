//! Cover image for the published digest.
//!
//! ```text
//! ┌──────────────────────────── 900 ────────────────────────────┐
//! │                    Tech Digest 01.16          (48px, y=140) │ 383
//! │                    2026年01月16日             (24px, y=200) │
//! │         ( Claude泄密 ) ( GitHub Actions被骂 ) (18px, y=262) │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Vertical gradient from `#667eea` to `#764ba2`, saved as JPEG quality 95.

use crate::error::Result;
use crate::keywords::MAX_KEYWORDS;
use ab_glyph::{FontVec, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

pub const COVER_WIDTH: u32 = 900;
pub const COVER_HEIGHT: u32 = 383;
const JPEG_QUALITY: u8 = 95;

const GRADIENT_TOP: [u8; 3] = [102, 126, 234];
const GRADIENT_BOTTOM: [u8; 3] = [118, 75, 162];
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const TITLE_SIZE: f32 = 48.0;
const DATE_SIZE: f32 = 24.0;
const TAG_SIZE: f32 = 18.0;
const TITLE_Y: i32 = 140;
const DATE_Y: i32 = 200;
const TAG_Y: i32 = 262;

const PILL_HEIGHT: u32 = 34;
const PILL_PADDING: u32 = 14;
const PILL_GAP: u32 = 12;
const PILL_ALPHA: f32 = 0.25;

/// What goes on the cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverSpec {
    pub title: String,
    /// `2026年01月16日`
    pub date_text: String,
    tags: Vec<String>,
}

impl CoverSpec {
    /// Keeps at most four tags.
    pub fn new(title: impl Into<String>, date_text: impl Into<String>, tags: &[String]) -> Self {
        Self {
            title: title.into(),
            date_text: date_text.into(),
            tags: tags.iter().take(MAX_KEYWORDS).cloned().collect(),
        }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// First font in `paths` that reads and parses. TTC collections use face 0.
pub fn load_font(paths: &[PathBuf]) -> Option<FontVec> {
    for path in paths {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Font not readable");
                continue;
            }
        };
        match FontVec::try_from_vec_and_index(data, 0) {
            Ok(font) => {
                info!(path = %path.display(), "Loaded cover font");
                return Some(font);
            }
            Err(e) => debug!(path = %path.display(), error = %e, "Font not parseable"),
        }
    }
    warn!(candidates = paths.len(), "No usable font found; cover will carry no text");
    None
}

fn lerp(from: u8, to: u8, i: u32, steps: u32) -> u8 {
    let from = i32::from(from);
    let to = i32::from(to);
    (from + (to - from) * i as i32 / steps as i32) as u8
}

fn fill_gradient(img: &mut RgbImage) {
    let height = img.height();
    for (_, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = Rgb([
            lerp(GRADIENT_TOP[0], GRADIENT_BOTTOM[0], y, height),
            lerp(GRADIENT_TOP[1], GRADIENT_BOTTOM[1], y, height),
            lerp(GRADIENT_TOP[2], GRADIENT_BOTTOM[2], y, height),
        ]);
    }
}

fn draw_centered(img: &mut RgbImage, font: &FontVec, size: f32, center_y: i32, text: &str) {
    let scale = PxScale::from(size);
    let (w, h) = text_size(scale, font, text);
    let x = (COVER_WIDTH as i32 - w as i32) / 2;
    let y = center_y - h as i32 / 2;
    draw_text_mut(img, TEXT_COLOR, x, y, scale, font, text);
}

/// Translucent white rounded rectangle.
fn blend_pill(img: &mut RgbImage, left: i32, top: i32, width: u32, height: u32) {
    let radius = height as f32 / 2.0;
    for dy in 0..height {
        for dx in 0..width {
            let (x, y) = (left + dx as i32, top + dy as i32);
            if x < 0 || y < 0 || x >= img.width() as i32 || y >= img.height() as i32 {
                continue;
            }
            // distance to the nearest cap center
            let cx = (dx as f32 + 0.5).clamp(radius, width as f32 - radius);
            let (ox, oy) = (dx as f32 + 0.5 - cx, dy as f32 + 0.5 - radius);
            if ox * ox + oy * oy > radius * radius {
                continue;
            }
            let pixel = img.get_pixel_mut(x as u32, y as u32);
            for c in pixel.0.iter_mut() {
                *c = (f32::from(*c) * (1.0 - PILL_ALPHA) + 255.0 * PILL_ALPHA).round() as u8;
            }
        }
    }
}

fn tag_width(font: Option<&FontVec>, tag: &str) -> u32 {
    match font {
        Some(font) => text_size(PxScale::from(TAG_SIZE), font, tag).0,
        None => tag.chars().count() as u32 * TAG_SIZE as u32,
    }
}

fn draw_tags(img: &mut RgbImage, font: Option<&FontVec>, tags: &[String]) {
    if tags.is_empty() {
        return;
    }
    let widths: Vec<u32> = tags.iter().map(|t| tag_width(font, t) + 2 * PILL_PADDING).collect();
    let total = widths.iter().sum::<u32>() + PILL_GAP * (widths.len() as u32 - 1);
    let mut left = (COVER_WIDTH as i32 - total as i32) / 2;
    let top = TAG_Y - PILL_HEIGHT as i32 / 2;

    for (tag, width) in tags.iter().zip(&widths) {
        blend_pill(img, left, top, *width, PILL_HEIGHT);
        if let Some(font) = font {
            let scale = PxScale::from(TAG_SIZE);
            let (_, h) = text_size(scale, font, tag);
            draw_text_mut(img, TEXT_COLOR, left + PILL_PADDING as i32, TAG_Y - h as i32 / 2, scale, font, tag);
        }
        left += (*width + PILL_GAP) as i32;
    }
}

/// Render the cover in memory.
pub fn render_cover(spec: &CoverSpec, font: Option<&FontVec>) -> RgbImage {
    let mut img = RgbImage::new(COVER_WIDTH, COVER_HEIGHT);
    fill_gradient(&mut img);
    if let Some(font) = font {
        draw_centered(&mut img, font, TITLE_SIZE, TITLE_Y, &spec.title);
        draw_centered(&mut img, font, DATE_SIZE, DATE_Y, &spec.date_text);
    }
    draw_tags(&mut img, font, &spec.tags);
    img
}

/// Render and write the cover as JPEG at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), tags = spec.tags.len()))]
pub async fn save_cover(spec: &CoverSpec, font_paths: &[PathBuf], path: &Path) -> Result<()> {
    let font = load_font(font_paths);
    let img = render_cover(spec, font.as_ref());

    let mut bytes = Vec::new();
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY))?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &bytes).await?;
    info!(bytes = bytes.len(), "Cover written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(tags: usize) -> CoverSpec {
        let tags: Vec<String> = (0..tags).map(|i| format!("tag{i}")).collect();
        CoverSpec::new("Tech Digest 01.16", "2026年01月16日", &tags)
    }

    #[test]
    fn tags_are_capped_at_four() {
        assert_eq!(spec(6).tags().len(), 4);
        assert_eq!(spec(2).tags().len(), 2);
    }

    #[test]
    fn renders_gradient_without_font() {
        let img = render_cover(&spec(0), None);
        assert_eq!(img.dimensions(), (900, 383));
        assert_eq!(img.get_pixel(0, 0), &Rgb([102, 126, 234]));
        let bottom = img.get_pixel(0, 382).0;
        assert!(bottom[0].abs_diff(118) <= 1);
        assert!(bottom[1].abs_diff(75) <= 1);
        assert!(bottom[2].abs_diff(162) <= 1);
    }

    #[test]
    fn pills_lighten_the_tag_row() {
        let plain = render_cover(&spec(0), None);
        let tagged = render_cover(&spec(1), None);
        let center = (COVER_WIDTH / 2, TAG_Y as u32);
        let before = plain.get_pixel(center.0, center.1).0;
        let after = tagged.get_pixel(center.0, center.1).0;
        assert!(after[0] > before[0] && after[1] > before[1]);
        // corners of the canvas stay untouched
        assert_eq!(plain.get_pixel(0, TAG_Y as u32), tagged.get_pixel(0, TAG_Y as u32));
    }

    #[test]
    fn missing_fonts_yield_none() {
        assert!(load_font(&[PathBuf::from("/nonexistent/font.ttc")]).is_none());
    }

    #[tokio::test]
    async fn saves_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.jpg");
        save_cover(&spec(2), &[], &path).await.unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (900, 383));
    }
}
