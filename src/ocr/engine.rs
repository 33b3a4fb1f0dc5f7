use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

/// Tesseract page-segmentation behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    /// Fully automatic page segmentation (`--psm 3`)
    Auto,
    /// Single uniform block of text (`--psm 6`)
    SingleBlock,
    /// Single word (`--psm 8`)
    SingleWord,
    /// Sparse text, as much as possible in no particular order (`--psm 11`)
    SparseText,
}

impl PageSegMode {
    pub fn psm(self) -> u8 {
        match self {
            PageSegMode::Auto => 3,
            PageSegMode::SingleBlock => 6,
            PageSegMode::SingleWord => 8,
            PageSegMode::SparseText => 11,
        }
    }

    pub fn tag(self) -> String {
        format!("psm{}", self.psm())
    }
}

/// Black-box text recognition over one candidate image.
///
/// Implementations must not fail: engine faults come back as empty text so
/// the cascade can move on to its next strategy.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage, mode: PageSegMode) -> String;
}

/// Where to find Tesseract and which language data to use.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Executable path or bare command name resolved through PATH
    pub executable: PathBuf,
    /// Optional `--tessdata-dir`
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("tesseract"),
            tessdata_dir: None,
            language: "eng".to_string(),
        }
    }
}

/// Runs the Tesseract CLI as a subprocess, one call per image.
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Writes the image to a temporary PNG and reads Tesseract's stdout.
    pub fn run(&self, image: &DynamicImage, mode: PageSegMode) -> Result<String> {
        let temp_input = NamedTempFile::with_suffix(".png")
            .context("Failed to create temporary OCR input")?;
        image
            .save(temp_input.path())
            .context("Failed to write temporary OCR input")?;

        let mut command = Command::new(&self.config.executable);
        command.arg(temp_input.path()).arg("stdout");
        if let Some(tessdata) = &self.config.tessdata_dir {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        command
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(mode.psm().to_string());

        let output = command.output().with_context(|| {
            format!(
                "Failed to launch Tesseract at {}",
                self.config.executable.display()
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, image: &DynamicImage, mode: PageSegMode) -> String {
        match self.run(image, mode) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(psm = mode.psm(), error = %e, "recognition fault, treating as empty text");
                String::new()
            }
        }
    }
}
