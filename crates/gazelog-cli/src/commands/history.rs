use anyhow::Result;
use gazelog_storage::{Database, SessionSummary};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Commands")]
    commands: u32,
    #[tabled(rename = "Regions")]
    regions: usize,
    #[tabled(rename = "Dwell")]
    dwell: String,
}

impl From<&SessionSummary> for SessionRow {
    fn from(summary: &SessionSummary) -> Self {
        let seconds = (summary.ended_at - summary.started_at).num_seconds().max(0);
        Self {
            started: summary
                .started_at
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            duration: format_hms(seconds),
            commands: summary.command_count,
            regions: summary.report.entries().len(),
            dwell: format_hms(summary.total_dwell_ms() / 1000),
        }
    }
}

fn format_hms(total_seconds: i64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

pub fn history_command(limit: usize, json: bool) -> Result<()> {
    let db = Database::new(None)?;
    let sessions = db.list_sessions(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions archived yet.");
        return Ok(());
    }

    let rows: Vec<SessionRow> = sessions.iter().map(SessionRow::from).collect();
    println!("{}", Table::new(rows));

    if let Some(latest) = sessions.first() {
        println!("\nLatest session {}:", latest.id);
        for entry in latest.report.entries() {
            println!("  {:<20} {:>10} ms", entry.region, entry.total_ms);
        }
    }
    Ok(())
}
