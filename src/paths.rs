use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Width of the identifier token at the start of every photo file name.
pub const UNIT_ID_WIDTH: usize = 8;

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Splits a file stem into `(unit_id, remainder_name)` at the eighth character.
pub fn split_unit_id(stem: &str) -> (String, String) {
    match stem.char_indices().nth(UNIT_ID_WIDTH) {
        Some((at, _)) => (stem[..at].to_string(), stem[at..].to_string()),
        None => (stem.to_string(), String::new()),
    }
}

/// Left-pads a unit id with zeros to the fixed width.
pub fn pad_unit_id(unit_id: &str) -> String {
    format!("{:0>width$}", unit_id, width = UNIT_ID_WIDTH)
}

/// Upper-cases and drops spaces and underscores, for tolerant stem matching.
pub fn normalize_stem(stem: &str) -> String {
    stem.chars()
        .filter(|c| *c != ' ' && *c != '_')
        .flat_map(char::to_uppercase)
        .collect()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Image files directly inside `dir` with one of `extensions`, sorted by name.
pub fn list_images(dir: &Path, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, extensions) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

pub fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|s| s.to_str())
}

/// Stem lookup over one folder listing, built once per retry pass.
pub struct ImageIndex {
    by_stem: HashMap<String, PathBuf>,
    normalized: Vec<(String, PathBuf)>,
}

impl ImageIndex {
    pub fn build(dir: &Path, extensions: &[String]) -> io::Result<Self> {
        let mut by_stem = HashMap::new();
        let mut normalized = Vec::new();
        for path in list_images(dir, extensions)? {
            let Some(stem) = file_stem(&path) else {
                continue;
            };
            normalized.push((normalize_stem(stem), path.clone()));
            by_stem.entry(stem.to_string()).or_insert(path);
        }
        Ok(Self {
            by_stem,
            normalized,
        })
    }

    /// Finds the photo of a record read back from the table.
    ///
    /// Tries the zero-padded id, then the id with a `00` prefix, and with
    /// `fuzzy` a normalized prefix match on the padded candidate.
    pub fn locate(&self, unit_id: &str, remainder_name: &str, fuzzy: bool) -> Option<&Path> {
        let padded = format!("{}{}", pad_unit_id(unit_id), remainder_name);
        let prefixed = format!("00{}{}", unit_id, remainder_name);

        for candidate in [&padded, &prefixed] {
            if let Some(path) = self.by_stem.get(candidate.as_str()) {
                return Some(path);
            }
        }

        if fuzzy {
            let wanted = normalize_stem(&padded);
            return self
                .normalized
                .iter()
                .find(|(stem, _)| stem.starts_with(&wanted))
                .map(|(_, path)| path.as_path());
        }
        None
    }
}
