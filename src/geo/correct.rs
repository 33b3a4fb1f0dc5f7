//! Heuristic fixes for characteristic OCR misreads.
//!
//! Only two rewrites exist: the leading latitude digit, and a missing west
//! marker on a longitude whose magnitude fits the country band.

use super::city::GeoBox;

/// Leading digits OCR tends to produce in place of 1, 2 or 3.
pub const CONFUSABLE_LEADING_DIGITS: [char; 4] = ['9', '7', '5', '0'];

/// Expected leading digits the correction is allowed to restore.
pub const CORRECTABLE_EXPECTED_DIGITS: [char; 3] = ['1', '2', '3'];

/// Rewrites the leading latitude digit when it is a plausible misread of the
/// city's expected leading digit.
///
/// The expected digit is the first digit of `floor(lat_min)`. A leading `0`
/// in a city whose whole degrees start with `20` becomes `20`, since OCR
/// commonly drops the `2` there. Returns `None` when nothing changes.
pub fn correct_leading_digit(lat: &str, city: &GeoBox) -> Option<String> {
    let mut chars = lat.chars();
    let found = chars.next()?;
    if !CONFUSABLE_LEADING_DIGITS.contains(&found) {
        return None;
    }

    let expected_whole = (city.lat_min.floor() as i64).to_string();
    let expected = expected_whole.chars().next()?;
    if !CORRECTABLE_EXPECTED_DIGITS.contains(&expected) {
        return None;
    }

    let rest = chars.as_str();
    if found == '0' && expected_whole.starts_with("20") {
        Some(format!("20{rest}"))
    } else {
        Some(format!("{expected}{rest}"))
    }
}

/// Appends `W` to a longitude carrying no cardinal or sign when its magnitude
/// falls inside `band` (inclusive). Returns `None` when nothing changes.
pub fn infer_west(lon: &str, band: (f64, f64)) -> Option<String> {
    let trimmed = lon.trim();
    let upper = trimmed.to_ascii_uppercase();
    if upper.contains(['N', 'S', 'E', 'W', '-']) {
        return None;
    }

    let numeral: String = upper
        .replace(',', ".")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let magnitude: f64 = numeral.parse().ok()?;

    if band.0 <= magnitude && magnitude <= band.1 {
        Some(format!("{trimmed}W"))
    } else {
        None
    }
}
