//! Per-pass counts and their JSON export.

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Counts for one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub pass: String,
    /// Records handed to the cascade
    pub processed: usize,
    /// Records resolved during this pass
    pub resolved: usize,
    /// Records still unresolved in the table after this pass
    pub unresolved: usize,
    /// Records whose photo could not be found
    pub not_found: usize,
    /// Whether the table was rewritten
    pub table_written: bool,
}

impl PassSummary {
    pub fn log(&self) {
        tracing::info!(
            pass = %self.pass,
            processed = self.processed,
            resolved = self.resolved,
            unresolved = self.unresolved,
            not_found = self.not_found,
            "pass finished"
        );
    }
}

#[derive(Debug, Serialize)]
struct RunSummary<'a> {
    generated_at: String,
    city: &'a str,
    passes: &'a [PassSummary],
}

/// Export pass summaries to a JSON file.
///
/// The output is pretty-printed for human readability.
pub fn export_to_json(passes: &[PassSummary], city: &str, output_path: &Path) -> Result<()> {
    let summary = RunSummary {
        generated_at: Local::now().to_rfc3339(),
        city,
        passes,
    };
    let json =
        serde_json::to_string_pretty(&summary).context("Failed to serialize pass summary to JSON")?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create folder: {}", parent.display()))?;
    }
    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}
