//! Timestamps and the per-step time context.

use crate::errors::{CellflowError, CellflowResult};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

pub type Time = NaiveDateTime;

/// Format used when writing timestamps
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a timestamp string
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare date, which is
/// interpreted as midnight.
pub fn parse_time(value: &str) -> Option<Time> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse a required timestamp, naming `subject` and `field` in the error
pub(crate) fn parse_required_time(
    value: &str,
    subject: &str,
    field: &str,
) -> CellflowResult<Time> {
    if value.trim().is_empty() {
        return Err(CellflowError::configuration(
            subject,
            format!("{} is not set", field),
        ));
    }
    parse_time(value).ok_or_else(|| {
        CellflowError::configuration(
            subject,
            format!("{} '{}' is not a valid timestamp", field, value),
        )
    })
}

pub fn format_time(time: &Time) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Time information handed to every module on every step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    /// Start of the current time step
    pub time: Time,
    /// Length of the time step
    pub dt: Duration,
}

impl StepContext {
    pub fn new(time: Time, dt: Duration) -> Self {
        Self { time, dt }
    }

    /// Day of the year, starting at 1 on January 1st
    pub fn day_of_year(&self) -> u32 {
        self.time.ordinal()
    }

    /// End of the current time step
    pub fn end(&self) -> Time {
        self.time + self.dt
    }

    /// Length of the time step in seconds
    pub fn dt_seconds(&self) -> f64 {
        self.dt.num_seconds() as f64
    }
}
