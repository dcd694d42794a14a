use chrono::{DateTime, Utc};
use gazelog_storage::{DwellReport, LogSource, SessionLog, SessionSummary};

use crate::{
    command::Command,
    dwell::{DwellTracker, GazeEventKind},
};

/// What the session loop should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Keep running
    Handled,
    /// Session is over: export and shut down
    Finalize,
}

/// Owner of the enabled flag, the single-use session-start token and the
/// dwell statistics it gates.
#[derive(Debug, Default)]
pub struct SessionController {
    enabled: bool,
    started_at: Option<DateTime<Utc>>,
    first_enabled_at: Option<DateTime<Utc>>,
    command_count: u32,
    tracker: DwellTracker,
    log: SessionLog,
}

impl SessionController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable dwell accumulation. Repeating the current state is a no-op.
    ///
    /// Disabling closes every open interval at `now`.
    pub fn set_enabled(&mut self, enabled: bool, now: DateTime<Utc>) {
        if enabled == self.enabled {
            return;
        }

        if enabled {
            self.started_at = Some(now);
            self.first_enabled_at.get_or_insert(now);
            log::info!("Gaze tracking enabled");
        } else {
            self.tracker.flush_all(now);
            self.started_at = None;
            log::info!("Gaze tracking disabled");
        }
        self.enabled = enabled;
    }

    /// Take the session-start timestamp, leaving `None` behind.
    pub fn take_session_start(&mut self) -> Option<DateTime<Utc>> {
        self.started_at.take()
    }

    /// Forward a gaze event to the tracker. Dropped while disabled.
    ///
    /// Returns whether the event was accepted.
    pub fn feed_gaze(&mut self, region: &str, event: GazeEventKind, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            log::trace!("Dropping gaze {event} on {region}: tracking disabled");
            return false;
        }

        let session_start = self.take_session_start();
        self.tracker.feed(region, event, now, session_start);
        self.log.add(LogSource::Gaze, [event.as_str(), region], now);
        true
    }

    /// Interpret one command token and record it in the session log.
    pub fn handle_command(&mut self, raw: &str, now: DateTime<Utc>) -> CommandOutcome {
        let command = Command::parse(raw);
        self.command_count += 1;

        let source = if command.is_recognized() {
            LogSource::Command
        } else {
            LogSource::Note
        };
        self.log.add(source, [raw], now);

        match command {
            Command::Start | Command::Continue => {
                self.set_enabled(true, now);
                CommandOutcome::Handled
            }
            Command::Pause => {
                self.set_enabled(false, now);
                CommandOutcome::Handled
            }
            Command::Stop => {
                self.set_enabled(false, now);
                CommandOutcome::Finalize
            }
            Command::Unrecognized(text) => {
                log::debug!("Unrecognized command logged as note: {text:?}");
                CommandOutcome::Handled
            }
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &DwellTracker {
        &self.tracker
    }

    #[must_use]
    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    #[must_use]
    pub fn command_count(&self) -> u32 {
        self.command_count
    }

    #[must_use]
    pub fn report(&self) -> DwellReport {
        self.tracker.report()
    }

    /// Archive record of the session; `None` if it was never enabled.
    #[must_use]
    pub fn summarize(&self, ended_at: DateTime<Utc>) -> Option<SessionSummary> {
        self.first_enabled_at.map(|started_at| {
            SessionSummary::new(started_at, ended_at, self.command_count, self.report())
        })
    }
}

#[cfg(test)]
mod tests;
