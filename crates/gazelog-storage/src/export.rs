use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::{models::DwellReport, session_log::SessionLog};

/// Failure to persist session output
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to create output folder {path}: {source}")]
    CreateFolder { path: PathBuf, source: io::Error },

    #[error("Failed to save data into {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("Nothing to export")]
    Empty,
}

/// Destination that stores lines of records with an optional header line
pub trait RecordWriter {
    /// Write `records` under `name`, returning where they ended up.
    ///
    /// # Errors
    ///
    /// Returns an error if the destination cannot be written.
    fn write_records(
        &self,
        name: &str,
        records: &[String],
        header: Option<&str>,
    ) -> Result<PathBuf, ExportError>;
}

/// Writes record files into a folder
#[derive(Debug, Clone)]
pub struct FileRecordWriter {
    folder: PathBuf,
}

impl FileRecordWriter {
    #[must_use]
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// Relative names land in the writer's folder, absolute ones are kept.
    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.folder.join(path)
        }
    }
}

impl RecordWriter for FileRecordWriter {
    fn write_records(
        &self,
        name: &str,
        records: &[String],
        header: Option<&str>,
    ) -> Result<PathBuf, ExportError> {
        let path = self.resolve(name);

        if let Some(folder) = path.parent() {
            if !folder.exists() {
                fs::create_dir_all(folder).map_err(|source| ExportError::CreateFolder {
                    path: folder.to_path_buf(),
                    source,
                })?;
            }
        }

        let write = || -> io::Result<()> {
            let mut writer = BufWriter::new(File::create(&path)?);
            if let Some(header) = header.filter(|h| !h.is_empty()) {
                writeln!(writer, "{header}")?;
            }
            writeln!(writer, "{}", records.join("\n"))?;
            writer.flush()
        };

        write().map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;

        log::info!("Saved {} records to {}", records.len(), path.display());
        Ok(path)
    }
}

/// Where a finalized session was written
#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub log_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub errors: Vec<ExportError>,
}

impl ExportOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Renders session output and hands it to a record writer
pub struct Exporter<W: RecordWriter> {
    writer: W,
    file_prefix: String,
    report_header: Option<String>,
}

impl<W: RecordWriter> Exporter<W> {
    #[must_use]
    pub fn new(writer: W, file_prefix: impl Into<String>) -> Self {
        Self {
            writer,
            file_prefix: file_prefix.into(),
            report_header: None,
        }
    }

    /// First line written above the dwell report records
    #[must_use]
    pub fn with_report_header(mut self, header: impl Into<String>) -> Self {
        self.report_header = Some(header.into());
        self
    }

    /// Write the dwell report as `<prefix>_<stamp>_gaze.txt`.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails.
    pub fn save_report(&self, stamp: &str, report: &DwellReport) -> Result<PathBuf, ExportError> {
        let name = format!("{}_{stamp}_gaze.txt", self.file_prefix);
        self.writer
            .write_records(&name, &report.to_records(), self.report_header.as_deref())
    }

    /// Write the flow log as `<prefix>_<stamp>.txt`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Empty`] for a log without records, or an error if the writer fails.
    pub fn save_log(&self, stamp: &str, session_log: &SessionLog) -> Result<PathBuf, ExportError> {
        if !session_log.has_records() {
            return Err(ExportError::Empty);
        }
        let name = format!("{}_{stamp}.txt", self.file_prefix);
        self.writer
            .write_records(&name, &session_log.to_lines(), None)
    }

    /// Save the flow log and the dwell report of one session.
    ///
    /// Nothing is written when the log is empty. A failure on one file does not
    /// prevent the other from being attempted.
    pub fn export_session(
        &self,
        stamp: &str,
        session_log: &SessionLog,
        report: &DwellReport,
    ) -> ExportOutcome {
        let mut outcome = ExportOutcome::default();
        if !session_log.has_records() {
            log::info!("Session log is empty, nothing to export");
            return outcome;
        }

        match self.save_log(stamp, session_log) {
            Ok(path) => outcome.log_path = Some(path),
            Err(e) => outcome.errors.push(e),
        }
        match self.save_report(stamp, report) {
            Ok(path) => outcome.report_path = Some(path),
            Err(e) => outcome.errors.push(e),
        }
        outcome
    }
}
