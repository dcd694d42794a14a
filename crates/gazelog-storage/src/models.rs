use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Accumulated dwell time for one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDwell {
    pub region: String,
    pub total_ms: i64,
}

impl RegionDwell {
    #[must_use]
    pub fn new(region: impl Into<String>, total_ms: i64) -> Self {
        Self {
            region: region.into(),
            total_ms,
        }
    }
}

/// Per-region totals of a session, sorted by region name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwellReport {
    entries: Vec<RegionDwell>,
}

impl DwellReport {
    /// Build a report; entries are sorted by region name regardless of input order.
    #[must_use]
    pub fn new(mut entries: Vec<RegionDwell>) -> Self {
        entries.sort_by(|a, b| a.region.cmp(&b.region));
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[RegionDwell] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn total_ms(&self, region: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|e| e.region == region)
            .map(|e| e.total_ms)
    }

    /// One `region<TAB>total_ms` record per region
    #[must_use]
    pub fn to_records(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("{}\t{}", e.region, e.total_ms))
            .collect()
    }
}

/// Origin of a session log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogSource {
    /// Remote control command (recognized or not)
    Command,
    /// Gaze enter/exit accepted while the session was enabled
    Gaze,
    /// Free-form operator note
    Note,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Command => "command",
            Self::Gaze => "gaze",
            Self::Note => "note",
        };
        f.write_str(name)
    }
}

/// One line of the session (flow) log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub source: LogSource,
    pub fields: Vec<String>,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}",
            self.timestamp.timestamp_millis(),
            self.source
        )?;
        for field in &self.fields {
            write!(f, "\t{field}")?;
        }
        Ok(())
    }
}

/// Finalized study session, as archived
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub command_count: u32,
    pub report: DwellReport,
}

impl SessionSummary {
    #[must_use]
    pub fn new(
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        command_count: u32,
        report: DwellReport,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            ended_at,
            command_count,
            report,
        }
    }

    /// Sum of all region totals in milliseconds
    #[must_use]
    pub fn total_dwell_ms(&self) -> i64 {
        self.report.entries().iter().map(|e| e.total_ms).sum()
    }
}
