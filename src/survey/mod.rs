pub mod cascade;
pub mod config;
pub mod diagnostics;
pub mod record;
pub mod runner;
pub mod store;
pub mod summary;

#[cfg(test)]
pub(crate) mod testing;

pub use cascade::{Cascade, CascadeResult, Outcome};
pub use config::{load_config_from, locate_config, AppConfig, CascadeStep, PassConfig};
pub use diagnostics::DiagnosticSink;
pub use record::{CoordinateRecord, RecordKey, RecordStatus, RecordTable, NO_VALUE};
pub use runner::PassRunner;
pub use store::RecordStore;
pub use summary::{export_to_json, PassSummary};
