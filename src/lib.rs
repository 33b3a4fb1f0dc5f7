//! Survey Coordinates
//!
//! Reads the GPS coordinates burned into site-survey photos with a cascade
//! of preprocessing and OCR attempts, corrects and validates them against a
//! city proximity box, and keeps the results in a CSV record table that
//! later passes retry without touching resolved rows.

pub mod error;
pub mod geo;
pub mod ocr;
pub mod paths;
pub mod survey;
