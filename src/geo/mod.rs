pub mod city;
pub mod convert;
pub mod correct;

pub use city::{default_cities, find_city, CityProfile, GeoBox, GeoContext, COUNTRY_BOX};
pub use convert::{format_decimal, to_decimal, validate_proximity, validate_world, Axis};
pub use correct::{correct_leading_digit, infer_west};
