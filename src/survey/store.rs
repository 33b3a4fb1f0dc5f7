//! CSV-backed persistence for the record table.
//!
//! Reads accept legacy column names; writes always use the canonical header
//! and replace the file in one step so an interrupted pass never leaves a
//! half-written table behind.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::record::{CoordinateRecord, RecordTable, COLUMNS};
use crate::error::StoreError;

pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every row in file order. Fields and headers are trimmed, so
    /// hand-edited tables with padded cells still load.
    pub fn load(&self) -> Result<RecordTable, StoreError> {
        let file = File::open(&self.path).map_err(|source| StoreError::Open {
            path: self.path.clone(),
            source,
        })?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);
        let mut records = Vec::new();
        for row in reader.deserialize::<CoordinateRecord>() {
            let record = row.map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })?;
            records.push(record);
        }

        Ok(RecordTable::from_records(records))
    }

    /// Writes the whole table to a sibling temp file, then renames it over
    /// the store path.
    pub fn save(&self, table: &RecordTable) -> Result<(), StoreError> {
        let write_err = |source: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        let encode_err = |source: csv::Error| StoreError::Encode {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_err)?;
        let mut temp = NamedTempFile::new_in(&parent).map_err(write_err)?;

        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(temp.as_file_mut());
            writer.write_record(COLUMNS).map_err(encode_err)?;
            for record in table.records() {
                writer.serialize(record).map_err(encode_err)?;
            }
            writer.flush().map_err(write_err)?;
        }
        temp.as_file_mut().flush().map_err(write_err)?;

        temp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}
