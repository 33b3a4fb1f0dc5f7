//! Per-image cascade: region → scale → strategy → recognition → pattern,
//! stopping at the first match.

use image::DynamicImage;
use std::path::Path;

use super::config::PassConfig;
use crate::error::FailureReason;
use crate::geo::{
    correct_leading_digit, infer_west, to_decimal, validate_proximity, validate_world, GeoContext,
};
use crate::ocr::{
    bottom_crop, scale_image, select_region, CoordinateExtractor, PatternKind, PatternMatch,
    TextRecognizer,
};

/// Suffix added to the method tag of a match that failed validation.
pub const OUT_OF_RANGE_SUFFIX: &str = "_out_of_range";

/// What one cascade run decided for an image.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// Accepted read. `decimals` is `None` for DMS matches.
    Resolved {
        lat_raw: String,
        lon_raw: String,
        decimals: Option<(f64, f64)>,
        method: String,
    },
    /// A pattern matched but the coordinates failed conversion or validation.
    Rejected {
        lat_raw: String,
        lon_raw: String,
        method: String,
    },
    Failed(FailureReason),
}

impl Outcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Outcome::Resolved { .. })
    }
}

/// Outcome plus the images kept for diagnostics: the processed image of the
/// final attempt and the unprocessed bottom crop.
#[derive(Debug)]
pub struct CascadeResult {
    pub outcome: Outcome,
    pub evidence: Option<DynamicImage>,
    pub crop: Option<DynamicImage>,
}

impl CascadeResult {
    pub fn failed(reason: FailureReason) -> Self {
        Self {
            outcome: Outcome::Failed(reason),
            evidence: None,
            crop: None,
        }
    }
}

/// Read-only collaborators shared by every image of a pass.
pub struct Cascade<'a> {
    pub recognizer: &'a dyn TextRecognizer,
    pub extractor: &'a CoordinateExtractor,
    pub geo: &'a GeoContext,
}

impl Cascade<'_> {
    /// Loads the image at `path` and runs the pass cascade on it.
    pub fn process_file(&self, path: &Path, pass: &PassConfig) -> CascadeResult {
        match image::open(path) {
            Ok(img) => self.run(&img, pass),
            Err(e) => CascadeResult::failed(FailureReason::ImageLoad(e.to_string())),
        }
    }

    /// Tries each step in order; the first pattern match decides the outcome.
    pub fn run(&self, image: &DynamicImage, pass: &PassConfig) -> CascadeResult {
        let cropped = match bottom_crop(image, pass.crop_fraction) {
            Ok(cropped) => cropped,
            Err(reason) => return CascadeResult::failed(reason),
        };

        let mut last_attempt = None;
        for step in &pass.steps {
            let region = match select_region(&cropped, &step.region) {
                Ok(region) => region,
                Err(reason) => {
                    tracing::debug!(step = %step.tag(), reason = reason.tag(), "step skipped");
                    continue;
                }
            };
            let region = match step.scale {
                Some(factor) => match scale_image(&region, factor) {
                    Some(scaled) => scaled,
                    None => {
                        tracing::debug!(step = %step.tag(), "scaled region is empty, step skipped");
                        continue;
                    }
                },
                None => region,
            };

            let processed = step.strategy.apply(&region);
            let text = self.recognizer.recognize(&processed, step.mode);

            if let Some(found) = self.extractor.extract(&text) {
                let method = format!("{}_{}_{}", pass.name, step.tag(), found.kind.tag());
                return CascadeResult {
                    outcome: self.resolve(found, method),
                    evidence: Some(processed),
                    crop: Some(cropped),
                };
            }
            last_attempt = Some(processed);
        }

        let reason = if last_attempt.is_some() {
            FailureReason::NoPatternMatched
        } else {
            FailureReason::EmptyCrop
        };
        CascadeResult {
            outcome: Outcome::Failed(reason),
            evidence: last_attempt,
            crop: Some(cropped),
        }
    }

    /// Corrects, converts and validates a raw match.
    ///
    /// DMS matches skip conversion and validation and are always accepted.
    pub fn resolve(&self, found: PatternMatch, method: String) -> Outcome {
        let mut lat = found.lat;
        let mut lon = found.lon;

        if let Some(city) = &self.geo.city {
            if let Some(corrected) = correct_leading_digit(&lat, &city.bounds) {
                tracing::debug!(from = %lat, to = %corrected, "leading latitude digit corrected");
                lat = corrected;
            }
        }

        if found.kind == PatternKind::Dms {
            return Outcome::Resolved {
                lat_raw: lat,
                lon_raw: lon,
                decimals: None,
                method,
            };
        }

        if let Some(west) = infer_west(&lon, self.geo.country.lon_magnitude_band()) {
            lon = west;
        }

        let bounds = self.geo.proximity_box();
        match to_decimal(&lat).zip(to_decimal(&lon)) {
            Some((lat_dec, lon_dec))
                if validate_world(lat_dec, lon_dec)
                    && validate_proximity(lat_dec, lon_dec, &bounds) =>
            {
                Outcome::Resolved {
                    lat_raw: lat,
                    lon_raw: lon,
                    decimals: Some((lat_dec, lon_dec)),
                    method,
                }
            }
            _ => Outcome::Rejected {
                lat_raw: lat,
                lon_raw: lon,
                method: format!("{method}{OUT_OF_RANGE_SUFFIX}"),
            },
        }
    }
}
