//! Daily execution windows (`HH:MM`–`HH:MM`, same day, inclusive).

use chrono::NaiveTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("invalid time of day {0:?} (expected HH:MM)")]
    InvalidTime(String),
    #[error("window {start}-{end} crosses midnight; split it into two windows")]
    CrossesMidnight { start: String, end: String },
}

/// Time-of-day interval during which batches may run. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl ExecutionWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, WindowError> {
        if start > end {
            return Err(WindowError::CrossesMidnight {
                start: start.format("%H:%M").to_string(),
                end: end.format("%H:%M").to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parses `("02:00", "04:00")`.
    pub fn parse(start: &str, end: &str) -> Result<Self, WindowError> {
        Self::new(parse_hhmm(start)?, parse_hhmm(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// True when `t` lies in `[start, end]`.
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }
}

impl fmt::Display for ExecutionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime, WindowError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| WindowError::InvalidTime(s.to_string()))
}

/// True when `t` falls inside any of `windows`.
pub fn within_any(windows: &[ExecutionWindow], t: NaiveTime) -> bool {
    windows.iter().any(|w| w.contains(t))
}
