//! Calendar timestamp - posix seconds, microseconds and a quantized offset
//!
//! Design: plain value type with:
//! - Equality and ordering over the absolute instant only
//! - Timezone offset kept as metadata in 15-minute units
//! - Raw setters; range policy is applied by the capi layer

mod reader;


pub use reader::{DateTimeReader, ISO_FORMATS};

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::{CapiError, CapiResult};

pub const MICROSECONDS_PER_SECOND: u64 = 1_000_000;

/// Minutes covered by one timezone unit
pub const TIMEZONE_RESOLUTION_MINUTES: i64 = 15;

/// Plausible offsets: UTC-12:00 ..= UTC+14:00
pub const TIMEZONE_UNITS_MIN: i32 = -48;
pub const TIMEZONE_UNITS_MAX: i32 = 56;

/// Default rendering used by `tc_datetime_to_string`
pub const DEFAULT_DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

#[derive(Debug, Clone, Copy, Default)]
pub struct FlexDateTime {
    posix_seconds: i64,
    microseconds: u64,
    tz_offset_units: i32,
}

impl FlexDateTime {
    /// Epoch, zero microseconds, UTC
    pub const fn empty() -> Self {
        Self {
            posix_seconds: 0,
            microseconds: 0,
            tz_offset_units: 0,
        }
    }

    pub const fn from_posix_seconds(posix_seconds: i64) -> Self {
        Self {
            posix_seconds,
            microseconds: 0,
            tz_offset_units: 0,
        }
    }

    pub const fn from_parts(posix_seconds: i64, microseconds: u64, tz_offset_units: i32) -> Self {
        Self {
            posix_seconds,
            microseconds,
            tz_offset_units,
        }
    }

    pub fn from_fractional_seconds(seconds: f64) -> CapiResult<Self> {
        let mut dt = Self::empty();
        dt.set_fractional_seconds(seconds)?;
        Ok(dt)
    }

    #[inline]
    pub fn posix_seconds(&self) -> i64 {
        self.posix_seconds
    }

    #[inline]
    pub fn set_posix_seconds(&mut self, seconds: i64) {
        self.posix_seconds = seconds;
    }

    #[inline]
    pub fn microseconds(&self) -> u64 {
        self.microseconds
    }

    #[inline]
    pub fn set_microseconds(&mut self, microseconds: u64) {
        self.microseconds = microseconds;
    }

    #[inline]
    pub fn tz_offset_units(&self) -> i32 {
        self.tz_offset_units
    }

    #[inline]
    pub fn set_tz_offset_units(&mut self, units: i32) {
        self.tz_offset_units = units;
    }

    pub fn tz_offset_minutes(&self) -> i64 {
        i64::from(self.tz_offset_units) * TIMEZONE_RESOLUTION_MINUTES
    }

    /// Split `seconds` into floor seconds and rounded microseconds.
    ///
    /// Flooring keeps the microsecond part non-negative for pre-epoch
    /// instants: -1.25 becomes (-2, 750_000).
    pub fn set_fractional_seconds(&mut self, seconds: f64) -> CapiResult<()> {
        if !seconds.is_finite() {
            return Err(CapiError::out_of_range("fractional seconds", seconds));
        }

        let whole = seconds.floor();
        // i64::MAX is not exactly representable; 2^63 is the first value past it.
        if whole < i64::MIN as f64 || whole >= 9_223_372_036_854_775_808.0 {
            return Err(CapiError::out_of_range("fractional seconds", seconds));
        }

        let mut posix_seconds = whole as i64;
        let mut microseconds = ((seconds - whole) * MICROSECONDS_PER_SECOND as f64).round() as u64;
        if microseconds >= MICROSECONDS_PER_SECOND {
            posix_seconds = posix_seconds
                .checked_add(1)
                .ok_or_else(|| CapiError::out_of_range("fractional seconds", seconds))?;
            microseconds -= MICROSECONDS_PER_SECOND;
        }

        self.posix_seconds = posix_seconds;
        self.microseconds = microseconds;
        Ok(())
    }

    pub fn fractional_seconds(&self) -> f64 {
        self.posix_seconds as f64 + self.microseconds as f64 / MICROSECONDS_PER_SECOND as f64
    }

    /// Store `4 * hours + quarter_hours` units
    pub fn set_timezone_offset(&mut self, hours: i64, quarter_hours: i64) -> CapiResult<()> {
        self.tz_offset_units = Self::offset_units(hours, quarter_hours)?;
        Ok(())
    }

    /// Unit count for an hour / quarter-hour pair, rejecting only values
    /// that do not fit the storage type.
    pub fn offset_units(hours: i64, quarter_hours: i64) -> CapiResult<i32> {
        hours
            .checked_mul(4)
            .and_then(|units| units.checked_add(quarter_hours))
            .and_then(|units| i32::try_from(units).ok())
            .ok_or_else(|| {
                CapiError::out_of_range("timezone offset", format!("{}h + {}x15min", hours, quarter_hours))
            })
    }

    pub fn offset_in_plausible_range(units: i32) -> bool {
        (TIMEZONE_UNITS_MIN..=TIMEZONE_UNITS_MAX).contains(&units)
    }

    /// The instant as a chrono value in its recorded offset
    pub fn to_chrono(&self) -> CapiResult<DateTime<FixedOffset>> {
        let nanos = u32::try_from(self.microseconds)
            .ok()
            .filter(|us| u64::from(*us) < MICROSECONDS_PER_SECOND)
            .map(|us| us * 1_000)
            .ok_or_else(|| CapiError::out_of_range("microseconds", self.microseconds))?;

        let offset_seconds = self.tz_offset_minutes() * 60;
        let offset = i32::try_from(offset_seconds)
            .ok()
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| CapiError::out_of_range("timezone offset", self.tz_offset_units))?;

        let utc = DateTime::<Utc>::from_timestamp(self.posix_seconds, nanos)
            .ok_or_else(|| CapiError::out_of_range("posix seconds", self.posix_seconds))?;

        Ok(utc.with_timezone(&offset))
    }

    pub fn format(&self, pattern: &str) -> CapiResult<String> {
        use std::fmt::Write;

        let dt = self.to_chrono()?;
        let mut out = String::new();
        // chrono reports bad specifiers through fmt::Error instead of panicking here
        write!(out, "{}", dt.format(pattern))
            .map_err(|_| CapiError::parse(pattern, "invalid format pattern"))?;
        Ok(out)
    }

    #[inline]
    fn instant(&self) -> (i64, u64) {
        (self.posix_seconds, self.microseconds)
    }
}

impl PartialEq for FlexDateTime {
    fn eq(&self, other: &Self) -> bool {
        self.instant() == other.instant()
    }
}

impl Eq for FlexDateTime {}

impl PartialOrd for FlexDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FlexDateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant().cmp(&other.instant())
    }
}

impl fmt::Display for FlexDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format(DEFAULT_DISPLAY_FORMAT) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(
                f,
                "{}s+{}us@{}",
                self.posix_seconds, self.microseconds, self.tz_offset_units
            ),
        }
    }
}
