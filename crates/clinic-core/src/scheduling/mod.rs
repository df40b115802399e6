//! Slot management and the appointment lifecycle.

mod appointments;
mod slots;

pub use appointments::*;
pub use slots::*;

pub(crate) use appointments::check_person_overlaps;

use chrono::{NaiveDate, NaiveTime, Timelike};

use crate::error::{CoreError, CoreResult};
use crate::models::DATE_FORMAT;

/// Parse a calendar-valid `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> CoreResult<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.len() != 10 {
        return Err(CoreError::validation(format!(
            "invalid date {raw:?}: expected YYYY-MM-DD"
        )));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|e| CoreError::validation(format!("invalid date {raw:?}: {e}")))
}

/// Parse a time of day given as `HH:MM` or `HH:MM:SS` with zero seconds.
pub fn parse_time(raw: &str) -> CoreResult<NaiveTime> {
    let trimmed = raw.trim();
    let parsed = match trimmed.len() {
        5 => NaiveTime::parse_from_str(trimmed, "%H:%M"),
        8 => NaiveTime::parse_from_str(trimmed, "%H:%M:%S"),
        _ => {
            return Err(CoreError::validation(format!(
                "invalid time {raw:?}: expected HH:MM"
            )))
        }
    };
    let time = parsed.map_err(|e| CoreError::validation(format!("invalid time {raw:?}: {e}")))?;
    if time.second() != 0 {
        return Err(CoreError::validation(format!(
            "invalid time {raw:?}: seconds are not supported"
        )));
    }
    Ok(time)
}

fn require_id(value: &str, what: &str) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(format!("{what} is required")));
    }
    Ok(trimmed.to_string())
}
