use anyhow::{Context, Result};
use gazelog_core::{Config, Daemon, GazeEventKind, GazeFeed};
use gazelog_storage::{Database, Exporter, FileRecordWriter};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run_command(
    port: Option<u16>,
    output_dir: Option<PathBuf>,
    gaze_stdin: bool,
) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(output_dir) = output_dir {
        config.output_dir = output_dir;
    }

    let archive = if config.archive {
        Some(Database::new(None).context("Failed to open session archive")?)
    } else {
        None
    };
    let mut exporter = Exporter::new(
        FileRecordWriter::new(config.output_dir.clone()),
        config.file_prefix.clone(),
    );
    if let Some(header) = &config.report_header {
        exporter = exporter.with_report_header(header.clone());
    }

    let daemon = Daemon::bind(&config, exporter, archive).await?;
    println!("Listening for session commands on {}", daemon.local_addr()?);

    let gaze_task = gaze_stdin.then(|| tokio::spawn(read_gaze_from_stdin(daemon.gaze_feed())));

    let finalized = daemon.run_with_signals().await;

    if let Some(task) = gaze_task {
        task.abort();
    }

    if let Some(path) = &finalized.export.report_path {
        println!("Dwell report saved to {}", path.display());
    }
    if let Some(path) = &finalized.export.log_path {
        println!("Session log saved to {}", path.display());
    }
    for error in &finalized.export.errors {
        eprintln!("gazelog - Statistics: {error}");
    }
    if !finalized.export.is_success() {
        eprintln!("Dwell totals (ms) that could not be saved:");
        for record in finalized.report.to_records() {
            eprintln!("  {record}");
        }
    }

    log::info!("Session finished ({})", finalized.reason);
    Ok(())
}

/// Feed `enter <region>` / `exit <region>` lines to the session.
/// End of input counts as the gaze source disconnecting.
async fn read_gaze_from_stdin(feed: GazeFeed) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::warn!("Failed to read gaze input: {e}");
                break;
            }
        };

        let Some((kind, region)) = parse_gaze_line(&line) else {
            if !line.trim().is_empty() {
                log::warn!("Ignoring malformed gaze line: {line:?}");
            }
            continue;
        };

        let sent = match kind {
            GazeEventKind::Enter => feed.enter(region).await,
            GazeEventKind::Exit => feed.exit(region).await,
        };
        if sent.is_err() {
            return;
        }
    }

    log::info!("Gaze input closed");
    let _ = feed.close().await;
}

fn parse_gaze_line(line: &str) -> Option<(GazeEventKind, &str)> {
    let (kind, region) = line.trim().split_once(char::is_whitespace)?;
    let region = region.trim();
    if region.is_empty() {
        return None;
    }
    Some((GazeEventKind::parse(kind)?, region))
}
