use chrono::{DateTime, Duration, Utc};
use gazelog_storage::{DwellReport, RegionDwell};
use std::{collections::HashMap, fmt};

/// Gaze crossing a region boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeEventKind {
    Enter,
    Exit,
}

impl GazeEventKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
        }
    }

    /// Parse `enter` / `exit`, case-insensitive
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("enter") {
            Some(Self::Enter)
        } else if s.eq_ignore_ascii_case("exit") {
            Some(Self::Exit)
        } else {
            None
        }
    }
}

impl fmt::Display for GazeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dwell time of a single region
#[derive(Debug, Clone, Default)]
pub struct DwellAccumulator {
    total: Duration,
    active_since: Option<DateTime<Utc>>,
}

impl DwellAccumulator {
    #[must_use]
    pub fn total(&self) -> Duration {
        self.total
    }

    #[must_use]
    pub fn active_since(&self) -> Option<DateTime<Utc>> {
        self.active_since
    }

    /// Apply one event.
    ///
    /// An exit without an open interval is credited from `session_started_at`
    /// when given: gaze was already resting here when the session was enabled.
    pub fn feed(
        &mut self,
        event: GazeEventKind,
        now: DateTime<Utc>,
        session_started_at: Option<DateTime<Utc>>,
    ) {
        match event {
            GazeEventKind::Enter => self.active_since = Some(now),
            GazeEventKind::Exit => {
                if let Some(since) = self.active_since.take() {
                    self.add(now - since);
                } else if let Some(started_at) = session_started_at {
                    self.add(now - started_at);
                }
            }
        }
    }

    // Wall clock may step backwards; totals never decrease.
    fn add(&mut self, elapsed: Duration) {
        if elapsed > Duration::zero() {
            self.total += elapsed;
        }
    }
}

/// Per-region dwell accumulation
#[derive(Debug, Default)]
pub struct DwellTracker {
    regions: HashMap<String, DwellAccumulator>,
}

impl DwellTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Route an event to `region`, creating its accumulator on first sight.
    ///
    /// `session_started_at` must be `Some` only for the first event after the
    /// session was enabled, whichever region it belongs to.
    pub fn feed(
        &mut self,
        region: &str,
        event: GazeEventKind,
        now: DateTime<Utc>,
        session_started_at: Option<DateTime<Utc>>,
    ) {
        self.regions
            .entry(region.to_string())
            .or_default()
            .feed(event, now, session_started_at);
    }

    /// Close every open interval at `now`
    pub fn flush_all(&mut self, now: DateTime<Utc>) {
        for accumulator in self.regions.values_mut() {
            accumulator.feed(GazeEventKind::Exit, now, None);
        }
    }

    #[must_use]
    pub fn total(&self, region: &str) -> Duration {
        self.regions
            .get(region)
            .map_or_else(Duration::zero, DwellAccumulator::total)
    }

    #[must_use]
    pub fn is_active(&self, region: &str) -> bool {
        self.regions
            .get(region)
            .is_some_and(|a| a.active_since().is_some())
    }

    /// Known region names, unordered
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    /// Totals sorted by region name
    #[must_use]
    pub fn report(&self) -> DwellReport {
        DwellReport::new(
            self.regions
                .iter()
                .map(|(name, acc)| RegionDwell::new(name.clone(), acc.total().num_milliseconds()))
                .collect(),
        )
    }
}
