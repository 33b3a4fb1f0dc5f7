//! One record per source image, and the keyed table that holds them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::cascade::Outcome;

/// Raw-value marker for a coordinate that was never read.
pub const NO_VALUE: &str = "NO_VALUE";

/// Canonical column order of the record table.
pub const COLUMNS: [&str; 8] = [
    "unit_id",
    "remainder_name",
    "lat_raw",
    "lon_raw",
    "lat_decimal",
    "lon_decimal",
    "status",
    "extraction_method",
];

/// Written as `RESOLVED` / `UNRESOLVED`. Reads also accept the legacy
/// `CORRECTO` / `NO ENCONTRADO`, in any case and with surrounding blanks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum RecordStatus {
    #[serde(rename = "RESOLVED")]
    Resolved,
    #[serde(rename = "UNRESOLVED")]
    Unresolved,
}

impl TryFrom<String> for RecordStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_uppercase().as_str() {
            "RESOLVED" | "CORRECTO" => Ok(RecordStatus::Resolved),
            "UNRESOLVED" | "NO ENCONTRADO" => Ok(RecordStatus::Unresolved),
            _ => Err(format!("unknown record status {value:?}")),
        }
    }
}

/// Join key across passes: `unit_id` + `remainder_name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub unit_id: String,
    pub remainder_name: String,
}

/// Extraction result for one photo. Field order is the column order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateRecord {
    #[serde(alias = "OT")]
    pub unit_id: String,
    #[serde(alias = "Resto_Nombre")]
    pub remainder_name: String,
    #[serde(alias = "Latitud_Extraida")]
    pub lat_raw: String,
    #[serde(alias = "Longitud_Extraida")]
    pub lon_raw: String,
    #[serde(alias = "Latitud_Decimal")]
    pub lat_decimal: Option<f64>,
    #[serde(alias = "Longitud_Decimal")]
    pub lon_decimal: Option<f64>,
    #[serde(alias = "Estatus")]
    pub status: RecordStatus,
    /// Absent in tables written by older first passes
    #[serde(default, alias = "Metodo_Extraccion")]
    pub extraction_method: String,
}

impl CoordinateRecord {
    /// A record nothing has been read for yet.
    pub fn new(unit_id: &str, remainder_name: &str) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            remainder_name: remainder_name.to_string(),
            lat_raw: NO_VALUE.to_string(),
            lon_raw: NO_VALUE.to_string(),
            lat_decimal: None,
            lon_decimal: None,
            status: RecordStatus::Unresolved,
            extraction_method: String::new(),
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            unit_id: self.unit_id.clone(),
            remainder_name: self.remainder_name.clone(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == RecordStatus::Resolved
    }

    /// File stem the record was created from.
    pub fn stem(&self) -> String {
        format!("{}{}", self.unit_id, self.remainder_name)
    }

    /// Folds a cascade outcome into the record.
    ///
    /// Decimals survive only on `Resolved`. A failure leaves the previous raw
    /// values in place; a rejection keeps the out-of-range read only when
    /// `retain_rejected` is set.
    pub fn record_outcome(&mut self, outcome: &Outcome, retain_rejected: bool) {
        match outcome {
            Outcome::Resolved {
                lat_raw,
                lon_raw,
                decimals,
                method,
            } => {
                self.lat_raw = lat_raw.clone();
                self.lon_raw = lon_raw.clone();
                self.lat_decimal = decimals.map(|(lat, _)| lat);
                self.lon_decimal = decimals.map(|(_, lon)| lon);
                self.status = RecordStatus::Resolved;
                self.extraction_method = method.clone();
            }
            Outcome::Rejected {
                lat_raw,
                lon_raw,
                method,
            } => {
                if retain_rejected {
                    self.lat_raw = lat_raw.clone();
                    self.lon_raw = lon_raw.clone();
                } else {
                    self.lat_raw = NO_VALUE.to_string();
                    self.lon_raw = NO_VALUE.to_string();
                }
                self.lat_decimal = None;
                self.lon_decimal = None;
                self.status = RecordStatus::Unresolved;
                self.extraction_method = method.clone();
            }
            Outcome::Failed(reason) => {
                self.lat_decimal = None;
                self.lon_decimal = None;
                self.status = RecordStatus::Unresolved;
                self.extraction_method = reason.tag().to_string();
            }
        }
    }
}

/// Ordered records with a key index. Row order is preserved on write.
#[derive(Debug, Default)]
pub struct RecordTable {
    records: Vec<CoordinateRecord>,
    index: HashMap<RecordKey, usize>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from rows in file order. Rows repeating an earlier key
    /// are dropped.
    pub fn from_records(records: Vec<CoordinateRecord>) -> Self {
        let mut table = Self::new();
        for record in records {
            let key = record.key();
            if !table.push(record) {
                tracing::warn!(
                    unit_id = %key.unit_id,
                    remainder = %key.remainder_name,
                    "duplicate record key, keeping the first row"
                );
            }
        }
        table
    }

    /// Appends a record. Returns `false` and leaves the table unchanged if the
    /// key is already present.
    pub fn push(&mut self, record: CoordinateRecord) -> bool {
        let key = record.key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.records.len());
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CoordinateRecord] {
        &self.records
    }

    pub fn get(&self, key: &RecordKey) -> Option<&CoordinateRecord> {
        self.index.get(key).map(|&i| &self.records[i])
    }

    /// Copies of every record still unresolved, in table order.
    pub fn select_unresolved(&self) -> Vec<CoordinateRecord> {
        self.records
            .iter()
            .filter(|r| !r.is_resolved())
            .cloned()
            .collect()
    }

    /// Replaces the record with the same key.
    ///
    /// Returns `false` when the key is unknown or the stored record is already
    /// resolved; a resolved record is never overwritten.
    pub fn apply(&mut self, record: CoordinateRecord) -> bool {
        let Some(&i) = self.index.get(&record.key()) else {
            return false;
        };
        if self.records[i].is_resolved() {
            return false;
        }
        self.records[i] = record;
        true
    }

    pub fn count_status(&self, status: RecordStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;

    fn resolved(unit: &str) -> CoordinateRecord {
        let mut record = CoordinateRecord::new(unit, "_A");
        record.record_outcome(
            &Outcome::Resolved {
                lat_raw: "25.5N".into(),
                lon_raw: "100.2W".into(),
                decimals: Some((25.5, -100.2)),
                method: "p1_otsu_s50_psm3_decimal_cardinal".into(),
            },
            true,
        );
        record
    }

    #[test]
    fn test_new_record_is_unresolved_without_values() {
        let record = CoordinateRecord::new("00012345", "_POSTE");
        assert_eq!(record.status, RecordStatus::Unresolved);
        assert_eq!(record.lat_raw, NO_VALUE);
        assert_eq!(record.lat_decimal, None);
        assert_eq!(record.stem(), "00012345_POSTE");
    }

    #[test]
    fn test_rejected_outcome_respects_retention() {
        let rejected = Outcome::Rejected {
            lat_raw: "40.0N".into(),
            lon_raw: "70.0W".into(),
            method: "p3_raw_psm6_decimal_cardinal_out_of_range".into(),
        };

        let mut kept = CoordinateRecord::new("1", "");
        kept.record_outcome(&rejected, true);
        assert_eq!(kept.lat_raw, "40.0N");
        assert_eq!(kept.status, RecordStatus::Unresolved);
        assert_eq!(kept.lat_decimal, None);
        assert!(kept.extraction_method.ends_with("_out_of_range"));

        let mut cleared = CoordinateRecord::new("1", "");
        cleared.record_outcome(&rejected, false);
        assert_eq!(cleared.lat_raw, NO_VALUE);
        assert_eq!(cleared.lon_raw, NO_VALUE);
    }

    #[test]
    fn test_failure_keeps_previous_raw_values() {
        let mut record = CoordinateRecord::new("1", "");
        record.lat_raw = "99.1N".into();
        record.record_outcome(&Outcome::Failed(FailureReason::NoPatternMatched), true);
        assert_eq!(record.lat_raw, "99.1N");
        assert_eq!(record.extraction_method, "no_pattern_matched");
    }

    #[test]
    fn test_dms_resolution_has_no_decimals() {
        let mut record = CoordinateRecord::new("1", "");
        record.record_outcome(
            &Outcome::Resolved {
                lat_raw: "25°49'33\"".into(),
                lon_raw: "100°18'44\"".into(),
                decimals: None,
                method: "p1_otsu_s50_psm3_dms".into(),
            },
            true,
        );
        assert!(record.is_resolved());
        assert_eq!(record.lat_decimal, None);
        assert_eq!(record.lon_decimal, None);
    }

    #[test]
    fn test_table_rejects_duplicate_keys() {
        let mut table = RecordTable::new();
        assert!(table.push(CoordinateRecord::new("1", "_A")));
        assert!(!table.push(CoordinateRecord::new("1", "_A")));
        assert!(table.push(CoordinateRecord::new("1", "_B")));
        assert_eq!(table.len(), 2);

        let from_rows = RecordTable::from_records(vec![
            resolved("2"),
            CoordinateRecord::new("2", "_A"),
        ]);
        assert_eq!(from_rows.len(), 1);
        assert!(from_rows.records()[0].is_resolved());
    }

    #[test]
    fn test_select_unresolved_keeps_order() {
        let table = RecordTable::from_records(vec![
            CoordinateRecord::new("3", "_A"),
            resolved("1"),
            CoordinateRecord::new("2", "_A"),
        ]);
        let ids: Vec<_> = table
            .select_unresolved()
            .into_iter()
            .map(|r| r.unit_id)
            .collect();
        assert_eq!(ids, ["3", "2"]);
    }

    #[test]
    fn test_apply_by_key_never_regresses() {
        let mut table = RecordTable::from_records(vec![resolved("1"), CoordinateRecord::new("2", "_A")]);

        let mut update = CoordinateRecord::new("1", "_A");
        update.extraction_method = "no_pattern_matched".into();
        assert!(!table.apply(update), "resolved record must not be replaced");
        assert!(table.records()[0].is_resolved());

        let fixed = resolved("2");
        assert!(table.apply(fixed.clone()));
        assert_eq!(table.get(&fixed.key()), Some(&fixed));

        assert!(!table.apply(CoordinateRecord::new("9", "_Z")));
        assert_eq!(table.count_status(RecordStatus::Resolved), 2);
    }
}
