use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use serde::{Deserialize, Serialize};

/// Gaussian blur kernel width used before Otsu binarization.
pub const BLUR_KERNEL: u32 = 5;
/// Fixed global threshold for the simple strategy.
pub const SIMPLE_THRESHOLD: u8 = 127;
/// CLAHE tile grid (tiles per side).
pub const CLAHE_GRID: u32 = 8;
/// Dilation radius (L∞) after adaptive binarization.
pub const DILATION_RADIUS: u8 = 1;

/// One fixed image transform producing a candidate for recognition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Unprocessed color image
    Raw,
    /// Grayscale → 5×5 blur → inverted Otsu
    Otsu,
    /// Grayscale → inverted Otsu, no blur
    OtsuPlain,
    /// Grayscale → CLAHE (clip 3.0) → 5×5 blur → inverted Otsu
    Clahe,
    /// Grayscale → inverted fixed threshold at 127
    Simple,
    /// Grayscale → CLAHE (clip 4.0) → blur → inverted adaptive Gaussian (11, 2) → dilate
    Adaptive,
    /// Grayscale → CLAHE (clip 2.0) → adaptive Gaussian (15, 5)
    ClaheAdaptive,
    /// Grayscale → 3×3 sharpen → Otsu
    HighContrast,
}

impl Strategy {
    pub fn tag(self) -> &'static str {
        match self {
            Strategy::Raw => "raw",
            Strategy::Otsu => "otsu",
            Strategy::OtsuPlain => "otsu_plain",
            Strategy::Clahe => "clahe",
            Strategy::Simple => "simple",
            Strategy::Adaptive => "adaptive",
            Strategy::ClaheAdaptive => "clahe_adaptive",
            Strategy::HighContrast => "high_contrast",
        }
    }

    /// Runs the transform. Pure: the input is never modified.
    pub fn apply(self, img: &DynamicImage) -> DynamicImage {
        if self == Strategy::Raw {
            return img.clone();
        }

        let gray = img.to_luma8();
        let out = match self {
            Strategy::Raw => gray,
            Strategy::Otsu => otsu_binarize(&gaussian_blur(&gray, BLUR_KERNEL), true),
            Strategy::OtsuPlain => otsu_binarize(&gray, true),
            Strategy::Clahe => {
                let equalized = clahe(&gray, 3.0, CLAHE_GRID);
                otsu_binarize(&gaussian_blur(&equalized, BLUR_KERNEL), true)
            }
            Strategy::Simple => threshold_binary(&gray, SIMPLE_THRESHOLD, true),
            Strategy::Adaptive => {
                let equalized = clahe(&gray, 4.0, CLAHE_GRID);
                let blurred = gaussian_blur(&equalized, BLUR_KERNEL);
                let binary = adaptive_threshold_gaussian(&blurred, 11, 2, true);
                dilate(&binary, Norm::LInf, DILATION_RADIUS)
            }
            Strategy::ClaheAdaptive => {
                let equalized = clahe(&gray, 2.0, CLAHE_GRID);
                adaptive_threshold_gaussian(&equalized, 15, 5, false)
            }
            Strategy::HighContrast => otsu_binarize(&sharpen(&gray), false),
        };
        DynamicImage::ImageLuma8(out)
    }
}

/// Resizes by `factor` with bilinear filtering. `None` if the result would be empty.
pub fn scale_image(img: &DynamicImage, factor: f32) -> Option<DynamicImage> {
    let width = (img.width() as f32 * factor) as u32;
    let height = (img.height() as f32 * factor) as u32;
    if width == 0 || height == 0 {
        return None;
    }
    Some(img.resize_exact(width, height, FilterType::Triangle))
}

/// Sigma for a Gaussian kernel of width `ksize`, matching the usual
/// `0.3 * ((ksize - 1) * 0.5 - 1) + 0.8` rule.
fn kernel_sigma(ksize: u32) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

pub fn gaussian_blur(img: &GrayImage, ksize: u32) -> GrayImage {
    gaussian_blur_f32(img, kernel_sigma(ksize))
}

/// Binary threshold. Pixels above `level` become white, or black when `invert`.
pub fn threshold_binary(img: &GrayImage, level: u8, invert: bool) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let above = pixel[0] > level;
        let value = if above != invert { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Global threshold chosen by Otsu's method.
pub fn otsu_binarize(img: &GrayImage, invert: bool) -> GrayImage {
    threshold_binary(img, otsu_level(img), invert)
}

/// Adaptive threshold against a Gaussian-weighted local mean minus `c`.
///
/// `block` is the neighborhood width in pixels (odd).
pub fn adaptive_threshold_gaussian(img: &GrayImage, block: u32, c: i16, invert: bool) -> GrayImage {
    let local_mean = gaussian_blur_f32(img, kernel_sigma(block));
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let threshold = local_mean.get_pixel(x, y)[0] as i16 - c;
        let above = pixel[0] as i16 > threshold;
        let value = if above != invert { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// 3×3 sharpen (center 9, neighbors -1) with edge replication.
pub fn sharpen(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return output;
    }

    for y in 0..height {
        for x in 0..width {
            let mut acc: i32 = 0;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let sx = (x as i32 + dx).clamp(0, width as i32 - 1) as u32;
                    let sy = (y as i32 + dy).clamp(0, height as i32 - 1) as u32;
                    let weight = if dx == 0 && dy == 0 { 9 } else { -1 };
                    acc += weight * img.get_pixel(sx, sy)[0] as i32;
                }
            }
            output.put_pixel(x, y, Luma([acc.clamp(0, 255) as u8]));
        }
    }

    output
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into `grid × grid` tiles; each tile gets a histogram
/// clipped at `clip_limit × tile_area / 256` with the excess spread evenly,
/// and pixels are mapped by bilinear interpolation between the four nearest
/// tile lookup tables.
pub fn clahe(img: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let grid = grid.max(1);
    let tile_w = width.div_ceil(grid).max(1);
    let tile_h = height.div_ceil(grid).max(1);
    let tiles_x = width.div_ceil(tile_w) as usize;
    let tiles_y = height.div_ceil(tile_h) as usize;

    let mut luts = vec![[0u8; 256]; tiles_x * tiles_y];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx as u32 * tile_w;
            let y0 = ty as u32 * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts[ty * tiles_x + tx] = tile_lut(img, x0, y0, x1, y1, clip_limit);
        }
    }

    let mut output = GrayImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        let (tx0, tx1, ax) = interpolation_cell(x, tile_w, tiles_x);
        let (ty0, ty1, ay) = interpolation_cell(y, tile_h, tiles_y);
        let v = pixel[0] as usize;

        let top = luts[ty0 * tiles_x + tx0][v] as f32 * (1.0 - ax)
            + luts[ty0 * tiles_x + tx1][v] as f32 * ax;
        let bottom = luts[ty1 * tiles_x + tx0][v] as f32 * (1.0 - ax)
            + luts[ty1 * tiles_x + tx1][v] as f32 * ax;
        let mapped = top * (1.0 - ay) + bottom * ay;

        output.put_pixel(x, y, Luma([mapped.round().clamp(0.0, 255.0) as u8]));
    }

    output
}

fn tile_lut(img: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[img.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let area = (x1 - x0) * (y1 - y0);
    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }
    let bonus = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, count) in hist.iter_mut().enumerate() {
        *count += bonus + u32::from(i < remainder);
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    for (i, count) in hist.iter().enumerate() {
        cdf += count;
        lut[i] = ((cdf as f32 * 255.0 / area as f32).round()).min(255.0) as u8;
    }
    lut
}

/// Neighboring tile indices and the weight of the second one for a pixel coordinate.
fn interpolation_cell(pos: u32, tile: u32, tiles: usize) -> (usize, usize, f32) {
    let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
    let first = (f.floor().max(0.0) as usize).min(tiles - 1);
    let second = (first + 1).min(tiles - 1);
    let weight = if second == first {
        0.0
    } else {
        (f - first as f32).clamp(0.0, 1.0)
    };
    (first, second, weight)
}
