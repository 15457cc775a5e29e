//! Time-window gating: should a run happen now, and is a digest fresh enough.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::error::ConfigError;

/// Is `ts` within `window` of `now`?
///
/// A missing timestamp is never recent. Timestamps slightly in the future
/// (clock skew) count as recent.
pub fn is_recent(ts: Option<DateTime<Utc>>, now: DateTime<Utc>, window: Duration) -> bool {
    match ts {
        Some(ts) => now.signed_duration_since(ts) <= window,
        None => false,
    }
}

/// A daily UTC window, e.g. `13:00-15:30`. Windows may wrap past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl RunWindow {
    /// Whether the time-of-day of `now` falls in this window (inclusive).
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let t = now.time();
        if self.start <= self.end {
            t >= self.start && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }
}

impl FromStr for RunWindow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: "HARO_RUN_WINDOWS".into(),
            message,
        };

        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| invalid(format!("expected HH:MM-HH:MM, got '{s}'")))?;
        let parse = |t: &str| {
            NaiveTime::parse_from_str(t.trim(), "%H:%M")
                .map_err(|e| invalid(format!("bad time '{}': {e}", t.trim())))
        };

        Ok(Self {
            start: parse(start)?,
            end: parse(end)?,
        })
    }
}

/// The set of daily windows in which runs are allowed. Empty means always.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunWindows(Vec<RunWindow>);

impl RunWindows {
    /// Parse a comma-separated list like `13:00-15:30, 20:00-22:00`.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(RunWindow::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Whether a run may happen at `now`.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.0.is_empty() || self.0.iter().any(|w| w.contains(now))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Cron schedule that drives `watch` ticks.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    schedule: cron::Schedule,
}

impl TickSchedule {
    /// Parse a cron expression (seconds field first, e.g. `0 */15 * * * *`).
    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        let schedule = cron::Schedule::from_str(expr).map_err(|e| ConfigError::InvalidValue {
            key: "HARO_WATCH_CRON".into(),
            message: format!("invalid cron '{expr}': {e}"),
        })?;
        Ok(Self { schedule })
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }
}
