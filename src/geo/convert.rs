//! Cardinal/sign-suffixed strings to signed decimal degrees, and the two
//! geographic validators.

use super::city::GeoBox;

/// Which coordinate a value belongs to, for choosing its cardinal letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

/// Converts `"25.82588N"`, `"100,31W"` or `"-100.31"` to signed degrees.
///
/// A trailing `S`/`W` or a leading `-` makes the value negative. When both are
/// present the value is negated once (`"-100.5W"` is `-100.5`), never twice.
/// A leading `-` with a trailing `N`/`E` is still negative.
/// Returns `None` for DMS strings and anything that is not a plain numeral.
pub fn to_decimal(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() || text.contains('°') {
        return None;
    }

    let (signed_negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let (numeral, cardinal) = match body.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => {
            let upper = c.to_ascii_uppercase();
            if !matches!(upper, 'N' | 'S' | 'E' | 'W') {
                return None;
            }
            (&body[..body.len() - 1], Some(upper))
        }
        _ => (body, None),
    };

    let numeral = numeral.trim().replace(',', ".");
    if numeral.is_empty() || !numeral.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value: f64 = numeral.parse().ok()?;

    let negative = signed_negative || matches!(cardinal, Some('S') | Some('W'));
    Some(if negative { -value } else { value })
}

/// Renders a signed value back in cardinal form, e.g. `-100.31` → `"100.31W"`.
pub fn format_decimal(value: f64, axis: Axis) -> String {
    let cardinal = match (axis, value < 0.0) {
        (Axis::Latitude, false) => 'N',
        (Axis::Latitude, true) => 'S',
        (Axis::Longitude, false) => 'E',
        (Axis::Longitude, true) => 'W',
    };
    format!("{}{}", value.abs(), cardinal)
}

/// World bounds, inclusive.
pub fn validate_world(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Proximity box bounds, inclusive.
pub fn validate_proximity(lat: f64, lon: f64, bounds: &GeoBox) -> bool {
    bounds.contains(lat, lon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::city::{default_cities, COUNTRY_BOX};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_to_decimal_cardinals() {
        assert!(approx(to_decimal("25.82588N").unwrap(), 25.82588));
        assert!(approx(to_decimal("25.82588S").unwrap(), -25.82588));
        assert!(approx(to_decimal("100.31234W").unwrap(), -100.31234));
        assert!(approx(to_decimal("100.31234e").unwrap(), 100.31234));
        assert!(approx(to_decimal("100,5W").unwrap(), -100.5));
    }

    #[test]
    fn test_to_decimal_leading_sign() {
        assert!(approx(to_decimal("-100.555").unwrap(), -100.555));
        assert!(approx(to_decimal("+25.5").unwrap(), 25.5));
        assert!(approx(to_decimal("  25.5  ").unwrap(), 25.5));
    }

    #[test]
    fn test_sign_and_west_negate_once() {
        assert!(approx(to_decimal("-100.5W").unwrap(), -100.5));
        assert!(approx(to_decimal("-25.5S").unwrap(), -25.5));
    }

    #[test]
    fn test_sign_wins_over_north() {
        assert!(approx(to_decimal("-25.5N").unwrap(), -25.5));
    }

    #[test]
    fn test_to_decimal_malformed() {
        assert_eq!(to_decimal(""), None);
        assert_eq!(to_decimal("FALLO"), None);
        assert_eq!(to_decimal("25°49'33\""), None);
        assert_eq!(to_decimal("25.5X"), None);
        assert_eq!(to_decimal("1.2.3N"), None);
        assert_eq!(to_decimal("N"), None);
        assert_eq!(to_decimal("2 5.5N"), None);
    }

    #[test]
    fn test_round_trip_through_format() {
        for s in ["25.82588N", "100.31234W", "0.5S", "179.99999E", "90N", "31,25N"] {
            let axis = if s.ends_with(['N', 'S']) { Axis::Latitude } else { Axis::Longitude };
            let first = to_decimal(s).unwrap();
            let again = to_decimal(&format_decimal(first, axis)).unwrap();
            assert!(approx(first, again), "{s}: {first} vs {again}");
        }
    }

    #[test]
    fn test_validate_world_boundaries() {
        assert!(validate_world(90.0, 180.0));
        assert!(validate_world(-90.0, -180.0));
        assert!(validate_world(0.0, 0.0));
        assert!(!validate_world(90.0001, 0.0));
        assert!(!validate_world(0.0, -180.0001));
    }

    #[test]
    fn test_proximity_rejects_valid_world_coordinate() {
        let (lat, lon) = (40.0, -70.0);
        assert!(validate_world(lat, lon));
        assert!(!validate_proximity(lat, lon, &COUNTRY_BOX));
        for city in default_cities() {
            assert!(!validate_proximity(lat, lon, &city.bounds), "{}", city.name);
        }
    }
}
