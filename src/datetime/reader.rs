//! Text reader - parses date/time strings into `FlexDateTime`
//!
//! A caller pattern is a chrono strftime string. Without one, the ISO-8601
//! family in `ISO_FORMATS` is accepted. Naive inputs are read as UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

use super::{FlexDateTime, MICROSECONDS_PER_SECOND, TIMEZONE_RESOLUTION_MINUTES};
use crate::error::{CapiError, CapiResult};

/// Patterns tried, in order, when no pattern is configured.
/// `%.f` makes the fractional part optional.
pub const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%S%.f%z",
    "%Y%m%dT%H%M%S%.f",
    "%Y-%m-%d",
    "%Y%m%d",
];

#[derive(Debug, Clone, Default)]
pub struct DateTimeReader {
    pattern: Option<String>,
}

impl DateTimeReader {
    /// `None` or an empty pattern selects the ISO-8601 family
    pub fn new(pattern: Option<&str>) -> Self {
        Self {
            pattern: pattern.filter(|p| !p.is_empty()).map(str::to_owned),
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn read(&self, text: &str) -> CapiResult<FlexDateTime> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CapiError::parse(text, "empty date/time string"));
        }

        match &self.pattern {
            Some(pattern) => read_with(text, pattern),
            None => read_iso(text),
        }
    }
}

fn read_iso(text: &str) -> CapiResult<FlexDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return from_zoned(text, dt);
    }

    ISO_FORMATS
        .iter()
        .find_map(|pattern| read_with(text, pattern).ok())
        .ok_or_else(|| CapiError::parse(text, "not an ISO-8601 date/time"))
}

fn read_with(text: &str, pattern: &str) -> CapiResult<FlexDateTime> {
    // Zoned first: a naive parse would reject a pattern carrying %z anyway.
    let zoned_err = match DateTime::parse_from_str(text, pattern) {
        Ok(dt) => return from_zoned(text, dt),
        Err(e) => e,
    };

    if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
        return Ok(from_naive(naive));
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, pattern) {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(from_naive(midnight));
        }
    }

    Err(CapiError::parse(
        text,
        format!("does not match pattern '{}' ({})", pattern, zoned_err),
    ))
}

fn from_zoned(text: &str, dt: DateTime<FixedOffset>) -> CapiResult<FlexDateTime> {
    let offset_seconds = i64::from(dt.offset().local_minus_utc());
    let unit_seconds = TIMEZONE_RESOLUTION_MINUTES * 60;
    if offset_seconds % unit_seconds != 0 {
        return Err(CapiError::parse(
            text,
            "timezone offset is not a multiple of 15 minutes",
        ));
    }

    let units = (offset_seconds / unit_seconds) as i32;
    Ok(FlexDateTime::from_parts(dt.timestamp(), subsec_micros(dt.timestamp_subsec_micros()), units))
}

fn from_naive(naive: NaiveDateTime) -> FlexDateTime {
    let utc = naive.and_utc();
    FlexDateTime::from_parts(utc.timestamp(), subsec_micros(utc.timestamp_subsec_micros()), 0)
}

/// Leap-second representations report up to 1_999_999; fold them into the last microsecond.
fn subsec_micros(micros: u32) -> u64 {
    u64::from(micros).min(MICROSECONDS_PER_SECOND - 1)
}
