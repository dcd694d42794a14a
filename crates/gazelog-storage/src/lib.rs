pub mod db;
pub mod export;
pub mod migrations;
pub mod models;
pub mod session_log;

pub use db::Database;
pub use export::{ExportError, ExportOutcome, Exporter, FileRecordWriter, RecordWriter};
pub use models::{DwellReport, LogRecord, LogSource, RegionDwell, SessionSummary};
pub use session_log::SessionLog;
