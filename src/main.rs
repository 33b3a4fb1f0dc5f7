//! Survey Coordinates
//!
//! Command-line runner: loads config.json, applies flag overrides, and runs
//! the extraction passes over a folder of survey photos.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use survey_coords::ocr::TesseractEngine;
use survey_coords::paths;
use survey_coords::survey::{
    export_to_json, load_config_from, locate_config, AppConfig, PassRunner, RecordStore,
};

const LOG_FILE_NAME: &str = "survey_coords.log";

#[derive(Parser, Debug)]
#[command(name = "survey-coords")]
#[command(about = "Extract GPS coordinates burned into site-survey photos")]
#[command(version)]
struct Cli {
    /// Path to config.json (default: beside the executable, then the working directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder holding the survey photos
    #[arg(long)]
    images: Option<PathBuf>,

    /// Record table (CSV) to write and retry from
    #[arg(long)]
    table: Option<PathBuf>,

    /// Folder for failed and rejected crops
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// City whose proximity box validates reads
    #[arg(long)]
    city: Option<String>,

    /// Worker threads (0 = one per core)
    #[arg(long)]
    workers: Option<usize>,

    /// Maximum number of passes to run
    #[arg(long)]
    max_passes: Option<usize>,

    /// First pass to run, 1-based; later passes need an existing table
    #[arg(long, default_value_t = 1)]
    start_pass: usize,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(images) = &self.images {
            config.images_dir = images.clone();
        }
        if let Some(table) = &self.table {
            config.table_path = table.clone();
        }
        if let Some(diagnostics) = &self.diagnostics {
            config.diagnostics_dir = diagnostics.clone();
        }
        if let Some(city) = &self.city {
            config.city = city.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(max_passes) = self.max_passes {
            config.max_passes = max_passes;
        }
    }
}

/// Console output plus an appended log file in `<exe_dir>/logs/`.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false);

    let logs_dir = paths::get_logs_dir();
    let file = std::fs::create_dir_all(&logs_dir).ok().and_then(|_| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(logs_dir.join(LOG_FILE_NAME))
            .ok()
    });
    let file_layer = file.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

fn main() -> Result<()> {
    init_logging();

    // Panics go to the log file too
    std::panic::set_hook(Box::new(|panic_info| {
        tracing::error!("[PANIC] {}", panic_info);
    }));

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(locate_config);
    let mut config = load_config_from(&config_path);
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        images = %config.images_dir.display(),
        table = %config.table_path.display(),
        city = %config.city,
        passes = config.pass_budget(),
        "starting extraction"
    );

    let engine = TesseractEngine::new(config.tesseract.clone());
    let runner = PassRunner::new(&config, &engine)?;
    let summaries = runner.run(cli.start_pass)?;

    if let Some(path) = &config.summary_path {
        match export_to_json(&summaries, &config.city, path) {
            Ok(()) => tracing::info!(path = %path.display(), "pass summary exported"),
            Err(e) => tracing::warn!("failed to export pass summary: {:#}", e),
        }
    }

    let table = RecordStore::new(&config.table_path).load()?;
    let resolved = table.records().iter().filter(|r| r.is_resolved()).count();
    tracing::info!(
        resolved,
        unresolved = table.len() - resolved,
        total = table.len(),
        "extraction finished"
    );

    Ok(())
}
