//! City proximity boxes and the country-wide fallback box.

use serde::{Deserialize, Serialize};

/// A latitude/longitude rectangle in signed decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeoBox {
    pub const fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.lat_min <= lat && lat <= self.lat_max && self.lon_min <= lon && lon <= self.lon_max
    }

    /// Range of absolute longitude values covered by the box, low to high.
    pub fn lon_magnitude_band(&self) -> (f64, f64) {
        let a = self.lon_min.abs();
        let b = self.lon_max.abs();
        (a.min(b), a.max(b))
    }

    pub fn is_ordered(&self) -> bool {
        self.lat_min <= self.lat_max && self.lon_min <= self.lon_max
    }
}

/// Country-wide box used when the requested city is unknown.
pub const COUNTRY_BOX: GeoBox = GeoBox::new(14.0, 33.0, -119.0, -86.0);

/// Named proximity box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CityProfile {
    pub name: String,
    #[serde(flatten)]
    pub bounds: GeoBox,
}

impl CityProfile {
    pub fn new(name: &str, bounds: GeoBox) -> Self {
        Self {
            name: name.to_string(),
            bounds,
        }
    }
}

/// Built-in city table.
pub fn default_cities() -> Vec<CityProfile> {
    vec![
        CityProfile::new("ENSENADA", GeoBox::new(31.0, 33.0, -117.5, -115.5)),
        CityProfile::new("TIJUANA", GeoBox::new(32.0, 34.0, -117.5, -115.5)),
        CityProfile::new("CHIHUAHUA", GeoBox::new(27.5, 29.5, -107.0, -105.0)),
        CityProfile::new("SALTILLO", GeoBox::new(24.5, 26.5, -102.0, -100.0)),
        CityProfile::new("CIUDAD VICTORIA", GeoBox::new(23.5, 25.5, -99.5, -97.5)),
        CityProfile::new("MONTERREY", GeoBox::new(25.0, 27.0, -101.0, -99.0)),
        CityProfile::new("NUEVO LAREDO", GeoBox::new(27.0, 29.0, -100.5, -98.5)),
        CityProfile::new("TAMPICO", GeoBox::new(21.0, 23.0, -99.0, -97.0)),
        CityProfile::new("GUADALAJARA", GeoBox::new(20.0, 22.0, -104.5, -102.5)),
        CityProfile::new("QUERETARO", GeoBox::new(20.0, 22.0, -101.5, -99.5)),
        CityProfile::new("SAN LUIS POTOSI", GeoBox::new(21.0, 23.0, -102.0, -100.0)),
        CityProfile::new("TOLUCA", GeoBox::new(18.5, 20.5, -100.5, -98.5)),
    ]
}

/// Case-insensitive lookup by city name.
pub fn find_city<'a>(cities: &'a [CityProfile], name: &str) -> Option<&'a CityProfile> {
    let wanted = name.trim();
    cities.iter().find(|c| c.name.eq_ignore_ascii_case(wanted))
}

/// Geographic context for one run: the proximity box in force plus the
/// country box that drives longitude sign inference.
#[derive(Clone, Debug)]
pub struct GeoContext {
    /// The matched city, or `None` when falling back to the country box.
    pub city: Option<CityProfile>,
    pub country: GeoBox,
}

impl GeoContext {
    pub fn resolve(name: &str, cities: &[CityProfile], country: GeoBox) -> Self {
        let city = find_city(cities, name).cloned();
        match &city {
            Some(c) => tracing::info!(
                city = %c.name,
                lat_min = c.bounds.lat_min,
                lat_max = c.bounds.lat_max,
                "proximity box loaded"
            ),
            None => tracing::warn!(
                city = name,
                lat_min = country.lat_min,
                lat_max = country.lat_max,
                "city not recognised, using country-wide box"
            ),
        }
        Self { city, country }
    }

    /// Box used for proximity validation.
    pub fn proximity_box(&self) -> GeoBox {
        self.city.as_ref().map(|c| c.bounds).unwrap_or(self.country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_city_case_insensitive() {
        let cities = default_cities();
        let city = find_city(&cities, "monterrey").unwrap();
        assert_eq!(city.bounds, GeoBox::new(25.0, 27.0, -101.0, -99.0));
        assert!(find_city(&cities, " San Luis Potosi ").is_some());
        assert!(find_city(&cities, "PARIS").is_none());
    }

    #[test]
    fn test_unknown_city_falls_back_to_country_box() {
        let ctx = GeoContext::resolve("ATLANTIS", &default_cities(), COUNTRY_BOX);
        assert!(ctx.city.is_none());
        assert_eq!(ctx.proximity_box(), COUNTRY_BOX);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let b = GeoBox::new(31.0, 33.0, -117.5, -115.5);
        assert!(b.contains(31.0, -117.5));
        assert!(b.contains(33.0, -115.5));
        assert!(!b.contains(33.0001, -116.0));
    }

    #[test]
    fn test_country_lon_band() {
        assert_eq!(COUNTRY_BOX.lon_magnitude_band(), (86.0, 119.0));
    }
}
