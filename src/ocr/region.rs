//! Selects the part of a photograph that carries the coordinate overlay.

use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

use crate::error::FailureReason;

/// A pixel rectangle `[x0, x1) × [y0, y1)` on the bottom crop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub const fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// Which part of the bottom crop a cascade step looks at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionSpec {
    /// The whole bottom crop
    Full,
    /// A fixed pixel rectangle inside the bottom crop
    Fixed(PixelRect),
}

/// Fixed fallback regions tried on the bottom crop of full-size photos.
pub const DEFAULT_ROIS: [PixelRect; 3] = [
    PixelRect::new(450, 750, 1024, 1024),
    PixelRect::new(0, 750, 550, 1024),
    PixelRect::new(0, 800, 1024, 1024),
];

/// Keeps the bottom `fraction` of the image, full width.
///
/// The first kept row is `floor(height * (1 - fraction))`.
pub fn bottom_crop(img: &DynamicImage, fraction: f64) -> Result<DynamicImage, FailureReason> {
    let (w, h) = img.dimensions();
    let fraction = fraction.clamp(0.0, 1.0);
    let y0 = ((h as f64 * (1.0 - fraction)) as u32).min(h);
    let rh = h - y0;

    if w == 0 || rh == 0 {
        return Err(FailureReason::EmptyCrop);
    }
    Ok(img.crop_imm(0, y0, w, rh))
}

/// Crops a fixed rectangle, clamping every edge to the image bounds.
pub fn crop_fixed(img: &DynamicImage, rect: &PixelRect) -> Result<DynamicImage, FailureReason> {
    let (w, h) = img.dimensions();

    let x0 = rect.x0.min(w);
    let x1 = rect.x1.min(w);
    let y0 = rect.y0.min(h);
    let y1 = rect.y1.min(h);

    if x1 <= x0 || y1 <= y0 {
        return Err(FailureReason::EmptyCrop);
    }
    Ok(img.crop_imm(x0, y0, x1 - x0, y1 - y0))
}

/// Applies a region spec to an already bottom-cropped image.
pub fn select_region(
    cropped: &DynamicImage,
    spec: &RegionSpec,
) -> Result<DynamicImage, FailureReason> {
    match spec {
        RegionSpec::Full => Ok(cropped.clone()),
        RegionSpec::Fixed(rect) => crop_fixed(cropped, rect),
    }
}
