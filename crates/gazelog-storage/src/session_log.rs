use chrono::{DateTime, Utc};

use crate::models::{LogRecord, LogSource};

/// Ordered flow log of everything that happened during a session
#[derive(Debug, Default)]
pub struct SessionLog {
    records: Vec<LogRecord>,
}

impl SessionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I, S>(&mut self, source: LogSource, fields: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let record = LogRecord {
            timestamp: now,
            source,
            fields: fields.into_iter().map(Into::into).collect(),
        };
        log::debug!("Session log: {record}");
        self.records.push(record);
    }

    #[must_use]
    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    #[must_use]
    pub fn count(&self, source: LogSource) -> usize {
        self.records.iter().filter(|r| r.source == source).count()
    }

    #[must_use]
    pub fn to_lines(&self) -> Vec<String> {
        self.records.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_count() {
        let mut log = SessionLog::new();
        assert!(!log.has_records());

        let now = Utc::now();
        log.add(LogSource::Command, ["start"], now);
        log.add(LogSource::Gaze, ["enter", "Windshield"], now);
        log.add(LogSource::Command, ["hello there"], now);

        assert!(log.has_records());
        assert_eq!(log.count(LogSource::Command), 2);
        assert_eq!(log.count(LogSource::Gaze), 1);
        assert_eq!(log.records()[1].fields, vec!["enter", "Windshield"]);
        assert_eq!(log.to_lines().len(), 3);
    }
}
