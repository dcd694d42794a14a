use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::PathBuf;
use uuid::Uuid;

use crate::migrations;
use crate::models::{DwellReport, RegionDwell, SessionSummary};

/// Archive of finalized sessions
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the archive database
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation, connection opening, or schema initialization fails
    pub fn new(db_path: Option<PathBuf>) -> Result<Self> {
        let path = db_path.unwrap_or_else(Self::default_db_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(&path).context("Failed to open database connection")?;
        migrations::init_schema(&conn)?;

        log::info!("Database initialized at: {}", path.display());
        Ok(Self { conn })
    }

    /// In-memory archive, gone when dropped
    ///
    /// # Errors
    ///
    /// Returns an error if schema initialization fails
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn default_db_path() -> PathBuf {
        let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("gazelog");
        path.push("gazelog.db");
        path
    }

    /// Store a finalized session with its per-region totals
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is stored in that case
    pub fn insert_session(&mut self, summary: &SessionSummary) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO sessions (id, started_at, ended_at, command_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                summary.id.to_string(),
                summary.started_at.to_rfc3339(),
                summary.ended_at.to_rfc3339(),
                summary.command_count,
            ],
        )?;
        for entry in summary.report.entries() {
            tx.execute(
                "INSERT INTO dwell_totals (session_id, region, total_ms) VALUES (?1, ?2, ?3)",
                params![summary.id.to_string(), entry.region, entry.total_ms],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Most recent sessions first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored row is corrupted
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, ended_at, command_count
             FROM sessions
             ORDER BY started_at DESC
             LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, started_at, ended_at, command_count)| -> Result<SessionSummary> {
                let id = Uuid::parse_str(&id).context("Corrupted session id")?;
                Ok(SessionSummary {
                    id,
                    started_at: parse_time(&started_at)?,
                    ended_at: parse_time(&ended_at)?,
                    command_count,
                    report: self.get_report(id)?,
                })
            })
            .collect()
    }

    /// Per-region totals of one session
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub fn get_report(&self, session_id: Uuid) -> Result<DwellReport> {
        let mut stmt = self
            .conn
            .prepare("SELECT region, total_ms FROM dwell_totals WHERE session_id = ?1")?;
        let entries = stmt
            .query_map(params![session_id.to_string()], |row| {
                Ok(RegionDwell::new(row.get::<_, String>(0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DwellReport::new(entries))
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Corrupted timestamp: {value}"))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn summary(start: DateTime<Utc>, regions: &[(&str, i64)]) -> SessionSummary {
        SessionSummary::new(
            start,
            start + Duration::minutes(10),
            3,
            DwellReport::new(
                regions
                    .iter()
                    .map(|(name, ms)| RegionDwell::new(*name, *ms))
                    .collect(),
            ),
        )
    }

    #[test]
    fn test_insert_and_list_sessions() {
        let mut db = Database::in_memory().unwrap();
        let now = Utc::now();
        let older = summary(now - Duration::hours(1), &[("Windshield", 500)]);
        let newer = summary(now, &[("RearView", 20), ("LeftMirror", 10)]);

        db.insert_session(&older).unwrap();
        db.insert_session(&newer).unwrap();

        let sessions = db.list_sessions(10).unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, newer.id);
        assert_eq!(sessions[0].command_count, 3);
        assert_eq!(
            sessions[0].report.to_records(),
            vec!["LeftMirror\t10", "RearView\t20"]
        );
        assert_eq!(sessions[1].report.total_ms("Windshield"), Some(500));

        assert_eq!(db.list_sessions(1).unwrap().len(), 1);
    }

    #[test]
    fn test_database_on_disk_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive").join("gazelog.db");
        let stored = summary(Utc::now(), &[("CentralConsole", 1234)]);

        {
            let mut db = Database::new(Some(path.clone())).unwrap();
            db.insert_session(&stored).unwrap();
        }

        let db = Database::new(Some(path)).unwrap();
        let report = db.get_report(stored.id).unwrap();
        assert_eq!(report.total_ms("CentralConsole"), Some(1234));
    }
}
