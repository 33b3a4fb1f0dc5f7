//! Run configuration.
//!
//! Loaded once from config.json at startup, validated, then passed by
//! reference. Every field has a default so a partial file is enough.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::geo::{default_cities, CityProfile, GeoBox, COUNTRY_BOX};
use crate::ocr::{PageSegMode, PixelRect, RegionSpec, Strategy, TesseractConfig, DEFAULT_ROIS};

pub const CONFIG_FILE_NAME: &str = "config.json";

/// One (region, scale, strategy, mode) attempt inside a pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CascadeStep {
    #[serde(default = "default_region")]
    pub region: RegionSpec,
    /// Downscale factor applied after region selection, `None` keeps full size
    #[serde(default)]
    pub scale: Option<f32>,
    pub strategy: Strategy,
    pub mode: PageSegMode,
}

fn default_region() -> RegionSpec {
    RegionSpec::Full
}

impl CascadeStep {
    fn new(region: RegionSpec, scale: Option<f32>, strategy: Strategy, mode: PageSegMode) -> Self {
        Self {
            region,
            scale,
            strategy,
            mode,
        }
    }

    /// Method tag fragment: `otsu_s50_psm3`, `adaptive_roi_psm8`, ...
    pub fn tag(&self) -> String {
        let mut tag = self.strategy.tag().to_string();
        if let Some(factor) = self.scale {
            tag.push_str(&format!("_s{}", (factor * 100.0).round() as u32));
        }
        if matches!(self.region, RegionSpec::Fixed(_)) {
            tag.push_str("_roi");
        }
        tag.push('_');
        tag.push_str(&self.mode.tag());
        tag
    }
}

/// One declarative extraction pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PassConfig {
    pub name: String,
    /// Bottom fraction of the photo kept before any step runs
    pub crop_fraction: f64,
    pub steps: Vec<CascadeStep>,
    /// Keep out-of-range raw values in the record instead of the no-value marker
    #[serde(default)]
    pub retain_rejected: bool,
    /// Write an annotated image for out-of-range reads
    #[serde(default)]
    pub overlay_rejected: bool,
    /// Extensions accepted when scanning or locating images
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Fall back to a normalized prefix match when exact lookup fails
    #[serde(default)]
    pub fuzzy_lookup: bool,
}

fn default_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "tiff"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Folder holding the survey photos
    pub images_dir: PathBuf,
    /// Record table (CSV)
    pub table_path: PathBuf,
    /// Folder for failed and rejected crops
    pub diagnostics_dir: PathBuf,
    /// City whose proximity box validates reads
    pub city: String,
    pub tesseract: TesseractConfig,
    /// Worker threads for the per-image cascade, 0 = one per core
    pub workers: usize,
    /// Maximum number of passes to run
    pub max_passes: usize,
    /// Fallback box for unknown cities and the west-marker band
    pub country_bounds: GeoBox,
    pub cities: Vec<CityProfile>,
    pub passes: Vec<PassConfig>,
    /// TTF/OTF font replacing the bundled one on rejected-reading overlays
    pub overlay_font: Option<PathBuf>,
    /// Where to export per-pass summaries as JSON
    pub summary_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("fotos"),
            table_path: PathBuf::from("coordinates.csv"),
            diagnostics_dir: PathBuf::from("diagnostics"),
            city: "MONTERREY".to_string(),
            tesseract: TesseractConfig::default(),
            workers: 0,
            max_passes: 4,
            country_bounds: COUNTRY_BOX,
            cities: default_cities(),
            passes: default_passes(),
            overlay_font: None,
            summary_path: None,
        }
    }
}

/// The four built-in passes, each more aggressive than the last.
pub fn default_passes() -> Vec<PassConfig> {
    use PageSegMode::{Auto, SingleBlock, SingleWord, SparseText};
    use RegionSpec::{Fixed, Full};

    let roi = |rect: PixelRect| CascadeStep::new(Fixed(rect), None, Strategy::Adaptive, SingleWord);

    let mut p1_steps = vec![
        CascadeStep::new(Full, Some(0.5), Strategy::Otsu, Auto),
        CascadeStep::new(Full, Some(0.5), Strategy::Clahe, Auto),
        CascadeStep::new(Full, Some(0.5), Strategy::Simple, Auto),
    ];
    p1_steps.extend(DEFAULT_ROIS.iter().copied().map(roi));

    let mut p4_extensions = default_extensions();
    p4_extensions.push("webp".to_string());

    vec![
        PassConfig {
            name: "p1".to_string(),
            crop_fraction: 0.30,
            steps: p1_steps,
            retain_rejected: true,
            overlay_rejected: false,
            extensions: default_extensions(),
            fuzzy_lookup: false,
        },
        PassConfig {
            name: "p2".to_string(),
            crop_fraction: 0.30,
            steps: vec![
                CascadeStep::new(Full, None, Strategy::ClaheAdaptive, Auto),
                CascadeStep::new(Full, None, Strategy::ClaheAdaptive, SingleBlock),
                CascadeStep::new(Full, None, Strategy::HighContrast, Auto),
                CascadeStep::new(Full, None, Strategy::HighContrast, SingleBlock),
            ],
            retain_rejected: false,
            overlay_rejected: false,
            extensions: default_extensions(),
            fuzzy_lookup: false,
        },
        PassConfig {
            name: "p3".to_string(),
            crop_fraction: 0.40,
            steps: vec![
                CascadeStep::new(Full, None, Strategy::Raw, SingleBlock),
                CascadeStep::new(Full, None, Strategy::Raw, SparseText),
                CascadeStep::new(Full, None, Strategy::OtsuPlain, SingleBlock),
            ],
            retain_rejected: true,
            overlay_rejected: false,
            extensions: default_extensions(),
            fuzzy_lookup: false,
        },
        PassConfig {
            name: "p4".to_string(),
            crop_fraction: 0.40,
            steps: vec![
                CascadeStep::new(Full, Some(0.5), Strategy::Raw, SingleBlock),
                CascadeStep::new(Full, None, Strategy::Raw, SingleBlock),
                CascadeStep::new(Full, None, Strategy::Raw, SparseText),
                CascadeStep::new(Full, None, Strategy::OtsuPlain, SingleBlock),
            ],
            retain_rejected: true,
            overlay_rejected: true,
            extensions: p4_extensions,
            fuzzy_lookup: true,
        },
    ]
}

impl AppConfig {
    /// Checks values that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.passes.is_empty() {
            return Err(ConfigError::NoPasses);
        }

        let mut names = HashSet::new();
        for pass in &self.passes {
            if !names.insert(pass.name.as_str()) {
                return Err(ConfigError::DuplicatePass(pass.name.clone()));
            }
            if !(pass.crop_fraction > 0.0 && pass.crop_fraction <= 1.0) {
                return Err(ConfigError::CropFraction {
                    pass: pass.name.clone(),
                    fraction: pass.crop_fraction,
                });
            }
            if pass.steps.is_empty() {
                return Err(ConfigError::EmptyCascade {
                    pass: pass.name.clone(),
                });
            }
            for factor in pass.steps.iter().filter_map(|s| s.scale) {
                if !(factor > 0.0 && factor <= 1.0) {
                    return Err(ConfigError::ScaleFactor {
                        pass: pass.name.clone(),
                        factor,
                    });
                }
            }
        }

        if !self.country_bounds.is_ordered() {
            return Err(ConfigError::InvertedBounds("country".to_string()));
        }
        if let Some(city) = self.cities.iter().find(|c| !c.bounds.is_ordered()) {
            return Err(ConfigError::InvertedBounds(city.name.clone()));
        }

        Ok(())
    }

    /// Number of passes a run may execute.
    pub fn pass_budget(&self) -> usize {
        self.max_passes.min(self.passes.len())
    }
}

/// Reads the configuration from `path`, falling back to defaults when the
/// file is missing or cannot be parsed.
pub fn load_config_from(path: &Path) -> AppConfig {
    tracing::info!(path = %path.display(), "looking for config");

    if !path.exists() {
        tracing::info!("config.json not found, using default config");
        return AppConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => {
                tracing::info!("config loaded from {}", path.display());
                config
            }
            Err(e) => {
                tracing::warn!("failed to parse {}: {}, using defaults", path.display(), e);
                AppConfig::default()
            }
        },
        Err(e) => {
            tracing::warn!("failed to read {}: {}, using defaults", path.display(), e);
            AppConfig::default()
        }
    }
}

/// Looks for config.json beside the executable, then in the working directory.
pub fn locate_config() -> PathBuf {
    let beside_exe = crate::paths::get_exe_dir().join(CONFIG_FILE_NAME);
    if beside_exe.exists() {
        beside_exe
    } else {
        PathBuf::from(CONFIG_FILE_NAME)
    }
}
