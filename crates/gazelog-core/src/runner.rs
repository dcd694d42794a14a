use chrono::{DateTime, Utc};
use gazelog_storage::{Database, DwellReport, ExportOutcome, Exporter, RecordWriter};
use std::fmt;
use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};

use crate::{
    dwell::GazeEventKind,
    session::{CommandOutcome, SessionController},
};

/// Everything that may change session state, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Token decoded by the command channel
    Command(String),
    /// Gaze crossed a region boundary
    Gaze {
        region: String,
        kind: GazeEventKind,
    },
    /// End the session without a `stop` command
    Finish(FinishReason),
}

/// Why a session was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// `stop` command received
    Stopped,
    /// Ctrl-C or an equivalent request
    Interrupted,
    /// The gaze data source disconnected
    SourceClosed,
    /// Every event producer is gone
    QueueClosed,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Stopped => "stop command",
            Self::Interrupted => "interrupt",
            Self::SourceClosed => "gaze source closed",
            Self::QueueClosed => "event queue closed",
        };
        f.write_str(reason)
    }
}

/// The gaze feed has no session left to deliver to
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session is no longer running")]
pub struct SessionGone;

/// Handle through which the region-resolution side reports gaze crossings.
///
/// Events travel over the session queue, so they are ordered with remote
/// commands and never touch dwell state directly.
#[derive(Debug, Clone)]
pub struct GazeFeed {
    events: mpsc::Sender<SessionEvent>,
}

impl GazeFeed {
    #[must_use]
    pub fn new(events: mpsc::Sender<SessionEvent>) -> Self {
        Self { events }
    }

    /// # Errors
    ///
    /// Returns [`SessionGone`] once the session loop has ended.
    pub async fn enter(&self, region: impl Into<String>) -> Result<(), SessionGone> {
        self.send(region.into(), GazeEventKind::Enter).await
    }

    /// # Errors
    ///
    /// Returns [`SessionGone`] once the session loop has ended.
    pub async fn exit(&self, region: impl Into<String>) -> Result<(), SessionGone> {
        self.send(region.into(), GazeEventKind::Exit).await
    }

    /// Report that the gaze source disconnected; finalizes the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGone`] once the session loop has ended.
    pub async fn close(&self) -> Result<(), SessionGone> {
        self.events
            .send(SessionEvent::Finish(FinishReason::SourceClosed))
            .await
            .map_err(|_| SessionGone)
    }

    async fn send(&self, region: String, kind: GazeEventKind) -> Result<(), SessionGone> {
        self.events
            .send(SessionEvent::Gaze { region, kind })
            .await
            .map_err(|_| SessionGone)
    }
}

/// Wall-clock anchored timestamps that advance with the monotonic clock.
/// Intervals between them ignore system clock steps.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl SessionClock {
    #[must_use]
    pub fn start() -> Self {
        Self {
            wall: Utc::now(),
            mono: Instant::now(),
        }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.mono.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }
}

/// Result of a finalized session
#[derive(Debug)]
pub struct Finalized {
    pub reason: FinishReason,
    pub report: DwellReport,
    pub export: ExportOutcome,
    pub archived: bool,
}

/// Single owner of session state; applies queued events one at a time.
pub struct SessionRunner<W: RecordWriter> {
    session: SessionController,
    exporter: Exporter<W>,
    archive: Option<Database>,
}

impl<W: RecordWriter> SessionRunner<W> {
    #[must_use]
    pub fn new(exporter: Exporter<W>, archive: Option<Database>) -> Self {
        Self {
            session: SessionController::new(),
            exporter,
            archive,
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Apply one event. Returns the reason to finish, if any.
    pub fn apply(&mut self, event: SessionEvent, now: DateTime<Utc>) -> Option<FinishReason> {
        match event {
            SessionEvent::Command(raw) => match self.session.handle_command(&raw, now) {
                CommandOutcome::Handled => None,
                CommandOutcome::Finalize => Some(FinishReason::Stopped),
            },
            SessionEvent::Gaze { region, kind } => {
                self.session.feed_gaze(&region, kind, now);
                None
            }
            SessionEvent::Finish(reason) => Some(reason),
        }
    }

    /// Process events until the session finishes, then finalize and signal
    /// `shutdown` so the command channel stops too.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<SessionEvent>,
        shutdown: watch::Sender<bool>,
    ) -> Finalized {
        let clock = SessionClock::start();
        let reason = loop {
            let Some(event) = events.recv().await else {
                break FinishReason::QueueClosed;
            };
            if let Some(reason) = self.apply(event, clock.now()) {
                break reason;
            }
        };

        events.close();
        let finalized = self.finalize(reason, clock.now());
        // Receivers may already be gone; nothing left to stop then.
        let _ = shutdown.send(true);
        finalized
    }

    /// Disable tracking, write the session files and archive the summary.
    ///
    /// Failures are logged and returned; totals stay in the returned report.
    pub fn finalize(&mut self, reason: FinishReason, now: DateTime<Utc>) -> Finalized {
        log::info!("Finalizing session ({reason})");
        self.session.set_enabled(false, now);

        let report = self.session.report();
        let stamp = now.format("%Y-%m-%d_%H-%M-%S").to_string();
        let export = self
            .exporter
            .export_session(&stamp, self.session.log(), &report);

        for error in &export.errors {
            log::error!("Session export failed: {error}");
        }
        if !export.is_success() {
            for record in report.to_records() {
                log::error!("Unsaved dwell total: {record}");
            }
        }

        let archived = self.archive_session(now);
        Finalized {
            reason,
            report,
            export,
            archived,
        }
    }

    fn archive_session(&mut self, now: DateTime<Utc>) -> bool {
        let Some(db) = self.archive.as_mut() else {
            return false;
        };
        let Some(summary) = self.session.summarize(now) else {
            log::info!("Session was never started, not archiving");
            return false;
        };

        match db.insert_session(&summary) {
            Ok(()) => {
                log::info!("Archived session {}", summary.id);
                true
            }
            Err(e) => {
                log::error!("Failed to archive session: {e:#}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gazelog_storage::FileRecordWriter;
    use std::fs;
    use tempfile::tempdir;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn gaze(region: &str, kind: GazeEventKind) -> SessionEvent {
        SessionEvent::Gaze {
            region: region.to_string(),
            kind,
        }
    }

    #[test]
    fn test_apply_sequence() {
        let dir = tempdir().unwrap();
        let mut runner = SessionRunner::new(
            Exporter::new(FileRecordWriter::new(dir.path()), "test"),
            None,
        );

        assert_eq!(runner.apply(gaze("A", GazeEventKind::Enter), at(0)), None);
        assert_eq!(runner.apply(SessionEvent::Command("start".into()), at(10)), None);
        assert_eq!(runner.apply(gaze("A", GazeEventKind::Enter), at(20)), None);
        assert_eq!(runner.apply(gaze("A", GazeEventKind::Exit), at(70)), None);
        assert_eq!(
            runner.apply(SessionEvent::Command("stop".into()), at(100)),
            Some(FinishReason::Stopped)
        );
        assert_eq!(runner.session().tracker().total("A"), Duration::milliseconds(50));
    }

    #[test]
    fn test_finalize_writes_files_and_archive() {
        let dir = tempdir().unwrap();
        let mut runner = SessionRunner::new(
            Exporter::new(FileRecordWriter::new(dir.path()), "test"),
            Some(Database::in_memory().unwrap()),
        );
        runner.apply(SessionEvent::Command("start".into()), at(0));
        runner.apply(gaze("Windshield", GazeEventKind::Exit), at(300));
        runner.apply(gaze("LeftMirror", GazeEventKind::Enter), at(300));

        let finalized = runner.finalize(FinishReason::Interrupted, at(500));

        assert!(finalized.export.is_success());
        assert!(finalized.archived);
        assert_eq!(finalized.report.to_records(), vec!["LeftMirror\t200", "Windshield\t300"]);
        let report_path = finalized.export.report_path.unwrap();
        assert_eq!(
            fs::read_to_string(report_path).unwrap(),
            "LeftMirror\t200\nWindshield\t300\n"
        );
        assert!(finalized.export.log_path.unwrap().exists());
    }

    #[test]
    fn test_finalize_failure_keeps_totals() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let mut runner = SessionRunner::new(
            Exporter::new(FileRecordWriter::new(blocker.join("sub")), "test"),
            None,
        );
        runner.apply(SessionEvent::Command("start".into()), at(0));
        runner.apply(gaze("RearView", GazeEventKind::Exit), at(40));

        let finalized = runner.finalize(FinishReason::Stopped, at(50));

        assert!(!finalized.export.is_success());
        assert!(!finalized.archived);
        assert_eq!(finalized.report.total_ms("RearView"), Some(40));
    }

    #[tokio::test]
    async fn test_session_clock_follows_monotonic_time() {
        let clock = SessionClock::start();
        let first = clock.now();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let second = clock.now();

        assert!(second - first >= Duration::milliseconds(20));
        assert!((first - Utc::now()).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn test_run_stops_on_stop_command_and_signals_shutdown() {
        let dir = tempdir().unwrap();
        let runner = SessionRunner::new(
            Exporter::new(FileRecordWriter::new(dir.path()), "test"),
            None,
        );
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(SessionEvent::Command("start".into())).await.unwrap();
        tx.send(SessionEvent::Command("stop".into())).await.unwrap();
        tx.send(SessionEvent::Command("start".into())).await.unwrap();

        let finalized = runner.run(rx, shutdown_tx).await;

        assert_eq!(finalized.reason, FinishReason::Stopped);
        assert!(*shutdown_rx.borrow());
    }

    #[tokio::test]
    async fn test_gaze_feed_close_finishes_session() {
        let dir = tempdir().unwrap();
        let runner = SessionRunner::new(
            Exporter::new(FileRecordWriter::new(dir.path()), "test"),
            None,
        );
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let feed = GazeFeed::new(tx);

        feed.enter("Windshield").await.unwrap();
        feed.close().await.unwrap();

        let finalized = runner.run(rx, shutdown_tx).await;
        assert_eq!(finalized.reason, FinishReason::SourceClosed);
        assert!(finalized.report.is_empty());
        assert_eq!(feed.exit("Windshield").await, Err(SessionGone));
    }

    #[tokio::test]
    async fn test_run_ends_when_producers_drop() {
        let dir = tempdir().unwrap();
        let runner = SessionRunner::new(
            Exporter::new(FileRecordWriter::new(dir.path()), "test"),
            None,
        );
        let (tx, rx) = mpsc::channel(8);
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        drop(tx);

        let finalized = runner.run(rx, shutdown_tx).await;
        assert_eq!(finalized.reason, FinishReason::QueueClosed);
    }
}
