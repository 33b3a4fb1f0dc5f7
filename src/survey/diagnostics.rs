//! Side folder of failed and rejected crops for manual review.
//!
//! Everything here is advisory: write errors are logged and never reach the
//! record table.

use ab_glyph::FontArc;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

use crate::geo::{format_decimal, to_decimal, Axis};

const BANNER_COLOR: Rgba<u8> = Rgba([20, 20, 20, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BANNER_WIDTH: u32 = 360;
const BANNER_HEIGHT: u32 = 56;
const TEXT_SCALE: f32 = 22.0;

/// Font used for overlay text unless a configured font replaces it.
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSansMono-Bold.ttf");

fn bundled_font() -> Option<FontArc> {
    match FontArc::try_from_slice(BUNDLED_FONT) {
        Ok(font) => Some(font),
        Err(e) => {
            tracing::warn!(error = %e, "bundled overlay font is unreadable");
            None
        }
    }
}

pub struct DiagnosticSink {
    dir: PathBuf,
    font: Option<FontArc>,
}

impl DiagnosticSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            font: bundled_font(),
        }
    }

    /// Replaces the bundled overlay font. A missing or invalid file keeps
    /// the bundled one.
    pub fn with_font(mut self, path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => self.font = Some(font),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "invalid overlay font"),
            },
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot read overlay font"),
        }
        self
    }

    pub fn failed_path(&self, pass: &str, stem: &str) -> PathBuf {
        self.dir.join(format!("{pass}_{stem}_failed.png"))
    }

    pub fn rejected_path(&self, pass: &str, stem: &str) -> PathBuf {
        self.dir.join(format!("{pass}_{stem}_out_of_range.png"))
    }

    /// Stores the last processed image of a cascade that found nothing.
    pub fn save_failed(&self, pass: &str, stem: &str, image: &DynamicImage) {
        self.write(&self.failed_path(pass, stem), image);
    }

    /// Stores the bottom crop a rejected reading came from, annotated with
    /// what was read.
    pub fn save_rejected(&self, pass: &str, stem: &str, image: &DynamicImage, lat: &str, lon: &str) {
        let lines = [
            format!("LAT: {}", overlay_value(lat, Axis::Latitude)),
            format!("LON: {}", overlay_value(lon, Axis::Longitude)),
        ];
        let annotated = render_overlay(image, &lines, self.font.as_ref());
        self.write(
            &self.rejected_path(pass, stem),
            &DynamicImage::ImageRgba8(annotated),
        );
    }

    fn write(&self, path: &Path, image: &DynamicImage) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), error = %e, "cannot create diagnostics folder");
            return;
        }
        match image.save(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "diagnostic image written"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to write diagnostic image"),
        }
    }
}

/// Normalized cardinal form when the value converts, the raw read otherwise.
fn overlay_value(raw: &str, axis: Axis) -> String {
    match to_decimal(raw) {
        Some(value) => format_decimal(value, axis),
        None => raw.to_string(),
    }
}

/// Draws a dark banner in the lower-left corner and, with a font, the text
/// lines on top of it.
pub fn render_overlay(image: &DynamicImage, lines: &[String], font: Option<&FontArc>) -> RgbaImage {
    let mut canvas = image.to_rgba8();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return canvas;
    }

    let banner_w = BANNER_WIDTH.min(width);
    let banner_h = BANNER_HEIGHT.min(height);
    let top = (height - banner_h) as i32;
    draw_filled_rect_mut(
        &mut canvas,
        Rect::at(0, top).of_size(banner_w, banner_h),
        BANNER_COLOR,
    );

    if let Some(font) = font {
        for (i, line) in lines.iter().enumerate() {
            let y = top + 4 + i as i32 * (TEXT_SCALE as i32 + 2);
            draw_text_mut(&mut canvas, TEXT_COLOR, 6, y, TEXT_SCALE, font, line);
        }
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;
    use tempfile::tempdir;

    fn white(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn test_diagnostic_names() {
        let sink = DiagnosticSink::new("diag");
        assert_eq!(
            sink.failed_path("p1", "00012345_A"),
            PathBuf::from("diag/p1_00012345_A_failed.png")
        );
        assert_eq!(
            sink.rejected_path("p4", "00012345_A"),
            PathBuf::from("diag/p4_00012345_A_out_of_range.png")
        );
    }

    #[test]
    fn test_save_failed_creates_folder() {
        let dir = tempdir().unwrap();
        let sink = DiagnosticSink::new(dir.path().join("diagnostics"));
        sink.save_failed("p1", "00000003_C", &white(20, 10));

        let written = image::open(sink.failed_path("p1", "00000003_C")).unwrap();
        assert_eq!(written.dimensions(), (20, 10));
    }

    #[test]
    fn test_overlay_banner_without_font() {
        let out = render_overlay(&white(400, 100), &["LAT: 40N".to_string()], None);
        assert_eq!(out.get_pixel(0, 99), &BANNER_COLOR);
        assert_eq!(out.get_pixel(359, 44), &BANNER_COLOR);
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(out.get_pixel(399, 99), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_overlay_on_tiny_image() {
        let out = render_overlay(&white(5, 3), &[], None);
        assert!(out.pixels().all(|p| *p == BANNER_COLOR));
    }

    fn red_pixels(image: &RgbaImage) -> usize {
        image
            .pixels()
            .filter(|p| p[0] > 200 && p[1] < 80 && p[2] < 80)
            .count()
    }

    #[test]
    fn test_bundled_font_loads() {
        assert!(bundled_font().is_some());
    }

    #[test]
    fn test_save_rejected_draws_text_by_default() {
        let dir = tempdir().unwrap();
        let sink = DiagnosticSink::new(dir.path());
        sink.save_rejected("p4", "00000001_A", &white(400, 100), "40.1234N", "70.5678W");

        let written = image::open(sink.rejected_path("p4", "00000001_A"))
            .unwrap()
            .to_rgba8();
        assert_eq!(written.dimensions(), (400, 100));
        assert!(red_pixels(&written) > 0);
    }

    #[test]
    fn test_save_rejected_with_missing_font() {
        let dir = tempdir().unwrap();
        let sink = DiagnosticSink::new(dir.path()).with_font(&dir.path().join("missing.ttf"));
        sink.save_rejected("p4", "00000001_A", &white(400, 100), "40.0N", "70.0W");

        // The bundled font is kept
        let written = image::open(sink.rejected_path("p4", "00000001_A"))
            .unwrap()
            .to_rgba8();
        assert!(red_pixels(&written) > 0);
    }

    #[test]
    fn test_overlay_without_font_has_no_text() {
        let out = render_overlay(&white(400, 100), &["LAT: 40N".to_string()], None);
        assert_eq!(red_pixels(&out), 0);
    }

    #[test]
    fn test_overlay_value_normalizes() {
        assert_eq!(overlay_value("-70.5", Axis::Longitude), "70.5W");
        assert_eq!(overlay_value("40°00'00\"", Axis::Latitude), "40°00'00\"");
    }
}
