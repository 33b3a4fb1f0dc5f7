//! Pass runner: the first pass scans the photo folder, every later pass
//! retries only the records still unresolved.
//!
//! Images of one pass are processed on a bounded worker pool. Results are
//! folded into the table on the calling thread and the table is written
//! once, at the end of the pass.

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::cascade::{Cascade, CascadeResult, Outcome};
use super::config::{AppConfig, PassConfig};
use super::diagnostics::DiagnosticSink;
use super::record::{CoordinateRecord, RecordStatus, RecordTable};
use super::store::RecordStore;
use super::summary::PassSummary;
use crate::error::{ConfigError, FailureReason};
use crate::geo::GeoContext;
use crate::ocr::{CoordinateExtractor, TextRecognizer};
use crate::paths::{file_stem, list_images, split_unit_id, ImageIndex};

/// A record and the photo it should be read from.
struct Job {
    record: CoordinateRecord,
    image: Option<PathBuf>,
}

pub struct PassRunner<'a> {
    config: &'a AppConfig,
    recognizer: &'a dyn TextRecognizer,
    extractor: CoordinateExtractor,
    geo: GeoContext,
    store: RecordStore,
    diagnostics: DiagnosticSink,
    pool: rayon::ThreadPool,
}

impl<'a> PassRunner<'a> {
    pub fn new(config: &'a AppConfig, recognizer: &'a dyn TextRecognizer) -> Result<Self> {
        let extractor =
            CoordinateExtractor::new().context("Failed to compile coordinate patterns")?;
        let geo = GeoContext::resolve(&config.city, &config.cities, config.country_bounds);

        let mut diagnostics = DiagnosticSink::new(&config.diagnostics_dir);
        if let Some(font) = &config.overlay_font {
            diagnostics = diagnostics.with_font(font);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .context("Failed to build worker pool")?;

        Ok(Self {
            config,
            recognizer,
            extractor,
            geo,
            store: RecordStore::new(&config.table_path),
            diagnostics,
            pool,
        })
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Runs passes from `start_pass` (1-based) until the budget is spent or
    /// nothing is left unresolved.
    pub fn run(&self, start_pass: usize) -> Result<Vec<PassSummary>> {
        let budget = self.config.pass_budget();
        if start_pass == 0 || start_pass > budget {
            return Err(ConfigError::StartPass {
                start: start_pass,
                count: budget,
            }
            .into());
        }

        let mut summaries = Vec::new();
        for (i, pass) in self
            .config
            .passes
            .iter()
            .enumerate()
            .take(budget)
            .skip(start_pass - 1)
        {
            let summary = if i == 0 {
                self.scan_pass(pass)?
            } else {
                self.retry_pass(pass)?
            };
            summary.log();

            let finished = summary.unresolved == 0;
            summaries.push(summary);
            if finished {
                tracing::info!("no unresolved records left, stopping");
                break;
            }
        }

        Ok(summaries)
    }

    /// Creates one record per photo in the folder and writes a fresh table.
    pub fn scan_pass(&self, pass: &PassConfig) -> Result<PassSummary> {
        let images = list_images(&self.config.images_dir, &pass.extensions).with_context(|| {
            format!(
                "Failed to list images in {}",
                self.config.images_dir.display()
            )
        })?;

        let mut seen = HashSet::new();
        let mut jobs = Vec::new();
        for path in images {
            let Some(stem) = file_stem(&path) else {
                tracing::warn!(file = %path.display(), "file name is not valid UTF-8, skipped");
                continue;
            };
            if !seen.insert(stem.to_string()) {
                tracing::warn!(file = %path.display(), "duplicate file stem, skipped");
                continue;
            }
            let (unit_id, remainder) = split_unit_id(stem);
            jobs.push(Job {
                record: CoordinateRecord::new(&unit_id, &remainder),
                image: Some(path),
            });
        }

        tracing::info!(pass = %pass.name, images = jobs.len(), "scan pass started");
        let processed = jobs.len();
        let results = self.process_jobs(pass, jobs);

        let resolved = results.iter().filter(|(_, o)| o.is_resolved()).count();
        let mut table = RecordTable::new();
        for (record, _) in results {
            table.push(record);
        }
        self.store.save(&table)?;

        Ok(PassSummary {
            pass: pass.name.clone(),
            processed,
            resolved,
            unresolved: table.count_status(RecordStatus::Unresolved),
            not_found: 0,
            table_written: true,
        })
    }

    /// Re-runs the pass cascade on unresolved records only. Leaves the table
    /// untouched when there is nothing to retry.
    pub fn retry_pass(&self, pass: &PassConfig) -> Result<PassSummary> {
        let mut table = self.store.load()?;
        let selected = table.select_unresolved();
        if selected.is_empty() {
            tracing::info!(pass = %pass.name, "no unresolved records, table left untouched");
            return Ok(PassSummary {
                pass: pass.name.clone(),
                ..PassSummary::default()
            });
        }

        let index = ImageIndex::build(&self.config.images_dir, &pass.extensions).with_context(
            || {
                format!(
                    "Failed to list images in {}",
                    self.config.images_dir.display()
                )
            },
        )?;

        let jobs: Vec<Job> = selected
            .into_iter()
            .map(|record| {
                let image = index
                    .locate(&record.unit_id, &record.remainder_name, pass.fuzzy_lookup)
                    .map(Path::to_path_buf);
                Job { record, image }
            })
            .collect();

        tracing::info!(pass = %pass.name, records = jobs.len(), "retry pass started");
        let processed = jobs.len();
        let results = self.process_jobs(pass, jobs);

        let resolved = results.iter().filter(|(_, o)| o.is_resolved()).count();
        let not_found = results
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Failed(FailureReason::ImageNotFound)))
            .count();
        for (record, _) in results {
            table.apply(record);
        }
        self.store.save(&table)?;

        Ok(PassSummary {
            pass: pass.name.clone(),
            processed,
            resolved,
            unresolved: table.count_status(RecordStatus::Unresolved),
            not_found,
            table_written: true,
        })
    }

    fn process_jobs(&self, pass: &PassConfig, jobs: Vec<Job>) -> Vec<(CoordinateRecord, Outcome)> {
        self.pool.install(|| {
            jobs.into_par_iter()
                .map(|job| self.process_one(pass, job))
                .collect()
        })
    }

    fn process_one(&self, pass: &PassConfig, job: Job) -> (CoordinateRecord, Outcome) {
        let Job { mut record, image } = job;
        let cascade = Cascade {
            recognizer: self.recognizer,
            extractor: &self.extractor,
            geo: &self.geo,
        };

        let result = match &image {
            Some(path) => cascade.process_file(path, pass),
            None => CascadeResult::failed(FailureReason::ImageNotFound),
        };

        let stem = record.stem();
        match &result.outcome {
            Outcome::Resolved { method, .. } => {
                tracing::info!(unit_id = %record.unit_id, method = %method, "resolved");
            }
            Outcome::Rejected {
                lat_raw,
                lon_raw,
                method,
            } => {
                tracing::warn!(
                    unit_id = %record.unit_id,
                    lat = %lat_raw,
                    lon = %lon_raw,
                    method = %method,
                    "coordinates out of range"
                );
                if pass.overlay_rejected {
                    if let Some(crop) = &result.crop {
                        self.diagnostics
                            .save_rejected(&pass.name, &stem, crop, lat_raw, lon_raw);
                    }
                }
            }
            Outcome::Failed(reason) => {
                tracing::warn!(unit_id = %record.unit_id, reason = %reason, "unresolved");
                if let Some(evidence) = &result.evidence {
                    self.diagnostics.save_failed(&pass.name, &stem, evidence);
                }
            }
        }

        record.record_outcome(&result.outcome, pass.retain_rejected);
        (record, result.outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::PageSegMode;
    use crate::survey::record::NO_VALUE;
    use crate::survey::testing::FakeRecognizer;
    use image::{DynamicImage, GrayImage, Luma};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, AppConfig) {
        let dir = tempdir().unwrap();
        let images = dir.path().join("fotos");
        fs::create_dir(&images).unwrap();

        let config = AppConfig {
            images_dir: images,
            table_path: dir.path().join("coordinates.csv"),
            diagnostics_dir: dir.path().join("diagnostics"),
            city: "MONTERREY".to_string(),
            workers: 2,
            ..AppConfig::default()
        };
        (dir, config)
    }

    fn write_photo(config: &AppConfig, name: &str, width: u32) {
        GrayImage::from_pixel(width, 100, Luma([180]))
            .save(config.images_dir.join(name))
            .unwrap();
    }

    /// Text depends only on the width of the candidate image: 100 px reads
    /// as decimal, 160 px as DMS, 480 px (unscaled 30% crop) as decimal.
    fn by_width() -> FakeRecognizer<impl Fn(&DynamicImage, PageSegMode) -> String + Send + Sync>
    {
        FakeRecognizer::new(|img: &DynamicImage, _mode: PageSegMode| match img.width() {
            100 => "2024/05/02 25.82588N 100.31234W".to_string(),
            160 => "25°49'33\" 100°18'44\"".to_string(),
            480 => "25,9012N 100,1234W".to_string(),
            _ => String::new(),
        })
    }

    fn three_photos(config: &AppConfig) {
        write_photo(config, "00000001_A.png", 200);
        write_photo(config, "00000002_B.png", 320);
        write_photo(config, "00000003_C.png", 480);
    }

    #[test]
    fn test_scan_pass_end_to_end() {
        let (_dir, config) = setup();
        three_photos(&config);
        let recognizer = by_width();
        let runner = PassRunner::new(&config, &recognizer).unwrap();

        let summary = runner.scan_pass(&config.passes[0]).unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.resolved, 2);
        assert_eq!(summary.unresolved, 1);

        let table = runner.store().load().unwrap();
        let rows = table.records();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].unit_id, "00000001");
        assert_eq!(rows[0].remainder_name, "_A");
        assert_eq!(rows[0].status, RecordStatus::Resolved);
        assert_eq!(rows[0].lat_decimal, Some(25.82588));
        assert_eq!(rows[0].lon_decimal, Some(-100.31234));
        assert_eq!(rows[0].extraction_method, "p1_otsu_s50_psm3_decimal_cardinal");

        assert_eq!(rows[1].status, RecordStatus::Resolved);
        assert_eq!(rows[1].lat_raw, "25°49'33\"");
        assert_eq!(rows[1].lat_decimal, None);
        assert_eq!(rows[1].lon_decimal, None);
        assert_eq!(rows[1].extraction_method, "p1_otsu_s50_psm3_dms");

        assert_eq!(rows[2].status, RecordStatus::Unresolved);
        assert_eq!(rows[2].lat_raw, NO_VALUE);
        assert_eq!(rows[2].extraction_method, "no_pattern_matched");
        assert!(config
            .diagnostics_dir
            .join("p1_00000003_C_failed.png")
            .exists());
    }

    #[test]
    fn test_run_retries_only_unresolved_and_stops_early() {
        let (_dir, config) = setup();
        three_photos(&config);
        let recognizer = by_width();
        let runner = PassRunner::new(&config, &recognizer).unwrap();

        let summaries = runner.run(1).unwrap();
        assert_eq!(summaries.len(), 2, "p3 and p4 are not needed");
        assert_eq!(summaries[1].pass, "p2");
        assert_eq!(summaries[1].processed, 1);
        assert_eq!(summaries[1].resolved, 1);
        assert_eq!(summaries[1].unresolved, 0);

        let table = runner.store().load().unwrap();
        let rows = table.records();
        assert_eq!(rows[0].extraction_method, "p1_otsu_s50_psm3_decimal_cardinal");
        assert_eq!(rows[2].lat_raw, "25.9012N");
        assert_eq!(rows[2].lat_decimal, Some(25.9012));
        assert_eq!(
            rows[2].extraction_method,
            "p2_clahe_adaptive_psm3_decimal_cardinal"
        );
    }

    #[test]
    fn test_retry_pass_with_nothing_unresolved_keeps_table_bytes() {
        let (_dir, config) = setup();
        write_photo(&config, "00000001_A.png", 200);
        write_photo(&config, "00000002_B.png", 320);
        let recognizer = by_width();
        let runner = PassRunner::new(&config, &recognizer).unwrap();
        runner.scan_pass(&config.passes[0]).unwrap();
        let before = fs::read(&config.table_path).unwrap();

        let calls_before = recognizer.calls().len();
        let summary = runner.retry_pass(&config.passes[1]).unwrap();
        assert!(!summary.table_written);
        assert_eq!(summary.processed, 0);
        assert_eq!(recognizer.calls().len(), calls_before);
        assert_eq!(fs::read(&config.table_path).unwrap(), before);

        let summaries = runner.run(3).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(fs::read(&config.table_path).unwrap(), before);
    }

    #[test]
    fn test_retry_pass_repads_legacy_unit_ids() {
        let (_dir, config) = setup();
        write_photo(&config, "00000007_POSTE.png", 480);
        fs::write(
            &config.table_path,
            "OT,Resto_Nombre,Latitud_Extraida,Longitud_Extraida,Latitud_Decimal,Longitud_Decimal,Estatus\n\
             7,_POSTE,NO_VALUE,NO_VALUE,,,NO ENCONTRADO\n",
        )
        .unwrap();

        let recognizer = by_width();
        let runner = PassRunner::new(&config, &recognizer).unwrap();
        let summary = runner.retry_pass(&config.passes[1]).unwrap();
        assert_eq!(summary.resolved, 1);

        let content = fs::read_to_string(&config.table_path).unwrap();
        assert!(content.starts_with("unit_id,remainder_name,"));
        assert!(content.contains("7,_POSTE,25.9012N,100.1234W,25.9012,-100.1234,RESOLVED,"));
    }

    #[test]
    fn test_retry_pass_missing_image_keeps_previous_values() {
        let (_dir, config) = setup();
        let mut record = CoordinateRecord::new("00000009", "_X");
        record.lat_raw = "45.1N".into();
        record.lon_raw = "60.2W".into();
        let store = RecordStore::new(&config.table_path);
        store.save(&RecordTable::from_records(vec![record])).unwrap();

        let recognizer = by_width();
        let runner = PassRunner::new(&config, &recognizer).unwrap();
        let summary = runner.retry_pass(&config.passes[3]).unwrap();
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.unresolved, 1);

        let row = store.load().unwrap().records()[0].clone();
        assert_eq!(row.lat_raw, "45.1N");
        assert_eq!(row.extraction_method, "image_not_found");
    }

    #[test]
    fn test_rejected_read_writes_overlay_in_last_pass() {
        let (_dir, config) = setup();
        write_photo(&config, "00000005_Z.png", 300);
        store_unresolved(&config, "00000005", "_Z");

        // 40% crop of a 300 px photo, halved: 150 px wide
        let recognizer = FakeRecognizer::new(|img: &DynamicImage, _mode: PageSegMode| {
            if img.width() == 150 {
                "40.1234N 70.5678W".to_string()
            } else {
                String::new()
            }
        });
        let runner = PassRunner::new(&config, &recognizer).unwrap();
        runner.retry_pass(&config.passes[3]).unwrap();

        let row = runner.store().load().unwrap().records()[0].clone();
        assert_eq!(row.status, RecordStatus::Unresolved);
        assert_eq!(row.lat_raw, "40.1234N");
        assert_eq!(row.lat_decimal, None);
        assert_eq!(
            row.extraction_method,
            "p4_raw_s50_psm6_decimal_cardinal_out_of_range"
        );

        // Drawn on the unprocessed 40% crop, with readable red text
        let overlay = image::open(config.diagnostics_dir.join("p4_00000005_Z_out_of_range.png"))
            .unwrap()
            .to_rgba8();
        assert_eq!(overlay.dimensions(), (300, 40));
        assert!(overlay
            .pixels()
            .any(|p| p[0] > 200 && p[1] < 80 && p[2] < 80));
    }

    fn store_unresolved(config: &AppConfig, unit_id: &str, remainder: &str) {
        RecordStore::new(&config.table_path)
            .save(&RecordTable::from_records(vec![CoordinateRecord::new(
                unit_id, remainder,
            )]))
            .unwrap();
    }

    #[test]
    fn test_scan_skips_duplicate_stems() {
        let (_dir, config) = setup();
        write_photo(&config, "00000001_A.jpg", 200);
        write_photo(&config, "00000001_A.png", 200);
        let recognizer = by_width();
        let runner = PassRunner::new(&config, &recognizer).unwrap();

        let summary = runner.scan_pass(&config.passes[0]).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(runner.store().load().unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_image_is_recorded_not_fatal() {
        let (_dir, config) = setup();
        write_photo(&config, "00000001_A.png", 200);
        fs::write(config.images_dir.join("00000002_B.png"), b"garbage").unwrap();
        let recognizer = by_width();
        let runner = PassRunner::new(&config, &recognizer).unwrap();

        runner.scan_pass(&config.passes[0]).unwrap();
        let table = runner.store().load().unwrap();
        assert_eq!(table.records()[1].extraction_method, "image_load_error");
        assert_eq!(table.records()[1].status, RecordStatus::Unresolved);
    }

    #[test]
    fn test_start_pass_bounds() {
        let (_dir, config) = setup();
        let recognizer = by_width();
        let runner = PassRunner::new(&config, &recognizer).unwrap();
        assert!(runner.run(0).is_err());
        assert!(runner.run(5).is_err());
    }

    #[test]
    fn test_retry_without_table_fails_without_creating_one() {
        let (_dir, config) = setup();
        let recognizer = by_width();
        let runner = PassRunner::new(&config, &recognizer).unwrap();
        assert!(runner.run(2).is_err());
        assert!(!config.table_path.exists());
    }
}
