use regex::Regex;

use crate::geo::to_decimal;

// Separators are matched lazily so a `-` right before the longitude stays
// with the longitude.

/// Decimal pair with cardinals: `25.82588N 100.31234W`. Either value may
/// carry an explicit sign.
const DECIMAL_CARDINAL_PATTERN: &str =
    r"(?i)([+-]?\d{1,3}[.,]\d+[NS])[\s,\-/]*?([+-]?\d{1,3}[.,]\d+[WE])";

/// Degree-minute-second pair: `25°49'33" -100°18'44"`.
const DMS_PATTERN: &str = r#"(\d{1,2}°\d{1,2}'\d{1,2}")[\s,\-/]*?(-?\d{1,3}°\d{1,2}'\d{1,2}")"#;

/// Decimal pair with optional sign and optional cardinal. At least two
/// fractional digits and one separator are required so dates and clock
/// readings in the overlay do not pair up.
const SIGNED_DECIMAL_PATTERN: &str =
    r"(?i)([+-]?\d{1,2}[.,]\d{2,}[NSEW]?)[\s,\-/]+?([+-]?\d{1,3}[.,]\d{2,}[NSEW]?)";

/// Loose numeric token, applied after stripping everything but digits and separators.
const LOOSE_TOKEN_PATTERN: &str = r"\d{1,3}[.,]\d{2,}";

/// Loose pairs below these magnitudes are incidental numbers, not coordinates.
const LOOSE_MIN_LAT_MAGNITUDE: f64 = 10.0;
const LOOSE_MIN_LON_MAGNITUDE: f64 = 70.0;

/// Which rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    DecimalCardinal,
    Dms,
    SignedDecimal,
    LooseNumeric,
}

impl PatternKind {
    pub fn tag(self) -> &'static str {
        match self {
            PatternKind::DecimalCardinal => "decimal_cardinal",
            PatternKind::Dms => "dms",
            PatternKind::SignedDecimal => "signed_decimal",
            PatternKind::LooseNumeric => "loose_numeric",
        }
    }

    /// Priority order in which rules are tried.
    pub const ORDER: [PatternKind; 4] = [
        PatternKind::DecimalCardinal,
        PatternKind::Dms,
        PatternKind::SignedDecimal,
        PatternKind::LooseNumeric,
    ];
}

/// A latitude/longitude string pair as read from OCR text.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    pub lat: String,
    pub lon: String,
    pub kind: PatternKind,
}

/// Compiled coordinate patterns. Build once, share across workers.
pub struct CoordinateExtractor {
    decimal_cardinal: Regex,
    dms: Regex,
    signed_decimal: Regex,
    loose_token: Regex,
    non_numeric: Regex,
}

impl CoordinateExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            decimal_cardinal: Regex::new(DECIMAL_CARDINAL_PATTERN)?,
            dms: Regex::new(DMS_PATTERN)?,
            signed_decimal: Regex::new(SIGNED_DECIMAL_PATTERN)?,
            loose_token: Regex::new(LOOSE_TOKEN_PATTERN)?,
            non_numeric: Regex::new(r"[^\d.,]")?,
        })
    }

    /// Tries every rule in priority order; the first match wins.
    pub fn extract(&self, text: &str) -> Option<PatternMatch> {
        let flattened = text.replace(['\n', '\r'], " ");
        let flattened = flattened.trim();
        if flattened.is_empty() {
            return None;
        }

        PatternKind::ORDER
            .iter()
            .find_map(|&kind| self.extract_with(kind, flattened))
    }

    /// Applies a single rule.
    pub fn extract_with(&self, kind: PatternKind, text: &str) -> Option<PatternMatch> {
        match kind {
            PatternKind::DecimalCardinal => capture_pair(&self.decimal_cardinal, text)
                .map(|(lat, lon)| PatternMatch {
                    lat: normalize_decimal(&lat),
                    lon: normalize_decimal(&lon),
                    kind,
                }),
            PatternKind::Dms => capture_pair(&self.dms, text).map(|(lat, lon)| PatternMatch {
                lat: lat.trim().to_string(),
                lon: lon.trim().to_string(),
                kind,
            }),
            PatternKind::SignedDecimal => capture_pair(&self.signed_decimal, text)
                .map(|(lat, lon)| PatternMatch {
                    lat: normalize_decimal(&lat),
                    lon: normalize_decimal(&lon),
                    kind,
                }),
            PatternKind::LooseNumeric => self.extract_loose(text),
        }
    }

    /// Last resort: any two long decimals, read as N latitude then W longitude.
    fn extract_loose(&self, text: &str) -> Option<PatternMatch> {
        let digits_only = self.non_numeric.replace_all(text, " ");
        let mut tokens = self.loose_token.find_iter(&digits_only);
        let lat = format!("{}N", tokens.next()?.as_str().replace(',', "."));
        let lon = format!("{}W", tokens.next()?.as_str().replace(',', "."));

        let lat_value = to_decimal(&lat)?;
        let lon_value = to_decimal(&lon)?;
        if lat_value.abs() > LOOSE_MIN_LAT_MAGNITUDE && lon_value.abs() > LOOSE_MIN_LON_MAGNITUDE {
            Some(PatternMatch {
                lat,
                lon,
                kind: PatternKind::LooseNumeric,
            })
        } else {
            None
        }
    }
}

fn capture_pair(re: &Regex, text: &str) -> Option<(String, String)> {
    let caps = re.captures(text)?;
    Some((caps.get(1)?.as_str().to_string(), caps.get(2)?.as_str().to_string()))
}

/// Decimal comma to point, upper-case cardinal, no leading `+`.
fn normalize_decimal(raw: &str) -> String {
    let trimmed = raw.trim();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    unsigned.replace(',', ".").to_ascii_uppercase()
}
