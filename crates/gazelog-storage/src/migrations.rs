use anyhow::Result;
use rusqlite::Connection;

/// Initialize database schema
///
/// # Errors
///
/// Returns an error if table or index creation fails
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Sessions table - one row per finalized study session
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            ended_at TEXT NOT NULL,
            command_count INTEGER NOT NULL
        )",
        [],
    )?;

    // Dwell totals - accumulated gaze time per region and session
    conn.execute(
        "CREATE TABLE IF NOT EXISTS dwell_totals (
            session_id TEXT NOT NULL,
            region TEXT NOT NULL,
            total_ms INTEGER NOT NULL,
            PRIMARY KEY (session_id, region),
            FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at)",
        [],
    )?;

    Ok(())
}
