pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod region;

pub use engine::{PageSegMode, TesseractConfig, TesseractEngine, TextRecognizer};
pub use extract::{CoordinateExtractor, PatternKind, PatternMatch};
pub use preprocess::{scale_image, Strategy};
pub use region::{bottom_crop, select_region, PixelRect, RegionSpec, DEFAULT_ROIS};
