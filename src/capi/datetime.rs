//! Datetime handles - create, mutate, compare and destroy `tc_datetime`

use std::os::raw::{c_char, c_int};
use std::ptr;

use super::{guard, into_c_string, opt_str, tc_datetime, tc_error};
use crate::config;
use crate::datetime::{DateTimeReader, FlexDateTime, DEFAULT_DISPLAY_FORMAT, MICROSECONDS_PER_SECOND};
use crate::error::{CapiError, CapiResult};
use crate::registry::{self, with_value, with_value_mut};

#[no_mangle]
pub extern "C" fn tc_datetime_create_empty(error: *mut *mut tc_error) -> *mut tc_datetime {
    guard("tc_datetime_create_empty", error, ptr::null_mut(), || {
        Ok(registry::wrap(FlexDateTime::empty()))
    })
}

/// Seconds since 1970-01-01T00:00:00 UTC
#[no_mangle]
pub extern "C" fn tc_datetime_create_from_posix_timestamp(
    posix_timestamp: i64,
    error: *mut *mut tc_error,
) -> *mut tc_datetime {
    guard("tc_datetime_create_from_posix_timestamp", error, ptr::null_mut(), || {
        Ok(registry::wrap(FlexDateTime::from_posix_seconds(posix_timestamp)))
    })
}

/// Seconds since the epoch with microsecond resolution
#[no_mangle]
pub extern "C" fn tc_datetime_create_from_posix_highres_timestamp(
    posix_timestamp: f64,
    error: *mut *mut tc_error,
) -> *mut tc_datetime {
    guard("tc_datetime_create_from_posix_highres_timestamp", error, ptr::null_mut(), || {
        let dt = FlexDateTime::from_fractional_seconds(posix_timestamp)?;
        Ok(registry::wrap(dt))
    })
}

/// Parse `datetime_str` with `format_str` (chrono strftime syntax).
///
/// A null or empty format uses the configured default pattern, or the
/// ISO-8601 family when none is configured.
#[no_mangle]
pub extern "C" fn tc_datetime_create_from_string(
    datetime_str: *const c_char,
    format_str: *const c_char,
    error: *mut *mut tc_error,
) -> *mut tc_datetime {
    guard("tc_datetime_create_from_string", error, ptr::null_mut(), || {
        let text = opt_str(datetime_str, "Datetime string")?
            .ok_or_else(|| CapiError::parse("", "Datetime string is null"))?;

        let format = match opt_str(format_str, "Format string")? {
            Some(f) if !f.is_empty() => Some(f.to_owned()),
            _ => config::with_current(|c| c.datetime.default_format.clone()),
        };

        let dt = DateTimeReader::new(format.as_deref()).read(text)?;
        Ok(registry::wrap(dt))
    })
}

/// Independent copy of `dt`
#[no_mangle]
pub extern "C" fn tc_datetime_clone(dt: *const tc_datetime, error: *mut *mut tc_error) -> *mut tc_datetime {
    guard("tc_datetime_clone", error, ptr::null_mut(), || {
        let copy = with_value::<FlexDateTime, _>(dt, |v| *v)?;
        Ok(registry::wrap(copy))
    })
}

/// Store `4 * n_tz_hour_offset + n_tz_15min_offsets` units of 15 minutes
#[no_mangle]
pub extern "C" fn tc_datetime_set_time_zone_offset(
    dt: *mut tc_datetime,
    n_tz_hour_offset: i64,
    n_tz_15min_offsets: i64,
    error: *mut *mut tc_error,
) {
    guard("tc_datetime_set_time_zone_offset", error, (), || {
        with_value_mut::<FlexDateTime, _>(dt, |v| {
            let units = FlexDateTime::offset_units(n_tz_hour_offset, n_tz_15min_offsets)?;
            if strict_fields() && !FlexDateTime::offset_in_plausible_range(units) {
                return Err(CapiError::out_of_range("timezone offset units", units));
            }
            v.set_tz_offset_units(units);
            Ok(())
        })?
    })
}

#[no_mangle]
pub extern "C" fn tc_datetime_get_time_zone_offset_minutes(
    dt: *const tc_datetime,
    error: *mut *mut tc_error,
) -> i64 {
    guard("tc_datetime_get_time_zone_offset_minutes", error, 0, || {
        with_value::<FlexDateTime, _>(dt, |v| v.tz_offset_minutes())
    })
}

#[no_mangle]
pub extern "C" fn tc_datetime_set_microsecond(
    dt: *mut tc_datetime,
    microseconds: u64,
    error: *mut *mut tc_error,
) {
    guard("tc_datetime_set_microsecond", error, (), || {
        with_value_mut::<FlexDateTime, _>(dt, |v| {
            if strict_fields() && microseconds >= MICROSECONDS_PER_SECOND {
                return Err(CapiError::out_of_range("microseconds", microseconds));
            }
            v.set_microseconds(microseconds);
            Ok(())
        })?
    })
}

#[no_mangle]
pub extern "C" fn tc_datetime_get_microsecond(dt: *const tc_datetime, error: *mut *mut tc_error) -> u64 {
    guard("tc_datetime_get_microsecond", error, 0, || {
        with_value::<FlexDateTime, _>(dt, |v| v.microseconds())
    })
}

#[no_mangle]
pub extern "C" fn tc_datetime_set_timestamp(dt: *mut tc_datetime, d: i64, error: *mut *mut tc_error) {
    guard("tc_datetime_set_timestamp", error, (), || {
        with_value_mut::<FlexDateTime, _>(dt, |v| v.set_posix_seconds(d))
    })
}

#[no_mangle]
pub extern "C" fn tc_datetime_get_timestamp(dt: *const tc_datetime, error: *mut *mut tc_error) -> i64 {
    guard("tc_datetime_get_timestamp", error, 0, || {
        with_value::<FlexDateTime, _>(dt, |v| v.posix_seconds())
    })
}

#[no_mangle]
pub extern "C" fn tc_datetime_set_highres_timestamp(dt: *mut tc_datetime, d: f64, error: *mut *mut tc_error) {
    guard("tc_datetime_set_highres_timestamp", error, (), || {
        with_value_mut::<FlexDateTime, _>(dt, |v| v.set_fractional_seconds(d))?
    })
}

#[no_mangle]
pub extern "C" fn tc_datetime_get_highres_timestamp(dt: *const tc_datetime, error: *mut *mut tc_error) -> f64 {
    guard("tc_datetime_get_highres_timestamp", error, 0.0, || {
        with_value::<FlexDateTime, _>(dt, |v| v.fractional_seconds())
    })
}

/// Nonzero if `dt1` is strictly before `dt2`. Offsets are ignored.
#[no_mangle]
pub extern "C" fn tc_datetime_less_than(
    dt1: *const tc_datetime,
    dt2: *const tc_datetime,
    error: *mut *mut tc_error,
) -> c_int {
    guard("tc_datetime_less_than", error, 0, || {
        let (a, b) = (snapshot(dt1)?, snapshot(dt2)?);
        Ok(c_int::from(a < b))
    })
}

/// Nonzero if `dt1` and `dt2` are the same instant. Offsets are ignored.
#[no_mangle]
pub extern "C" fn tc_datetime_equal(
    dt1: *const tc_datetime,
    dt2: *const tc_datetime,
    error: *mut *mut tc_error,
) -> c_int {
    guard("tc_datetime_equal", error, 0, || {
        let (a, b) = (snapshot(dt1)?, snapshot(dt2)?);
        Ok(c_int::from(a == b))
    })
}

/// Render in the recorded offset; free the result with `tc_string_free`.
/// A null format uses `%Y-%m-%dT%H:%M:%S%.6f%:z`.
#[no_mangle]
pub extern "C" fn tc_datetime_to_string(
    dt: *const tc_datetime,
    format_str: *const c_char,
    error: *mut *mut tc_error,
) -> *mut c_char {
    guard("tc_datetime_to_string", error, ptr::null_mut(), || {
        let format = opt_str(format_str, "Format string")?
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_FORMAT);
        let rendered = snapshot(dt)?.format(format)?;
        Ok(into_c_string(rendered))
    })
}

/// Free `dt`. Null is a no-op.
///
/// A second destroy of the same handle aborts while its allocation is still
/// quarantined; see [`registry::release_any`].
#[no_mangle]
pub extern "C" fn tc_datetime_destroy(dt: *mut tc_datetime) {
    registry::release::<FlexDateTime>(dt);
}

fn snapshot(dt: *const tc_datetime) -> CapiResult<FlexDateTime> {
    with_value::<FlexDateTime, _>(dt, |v| *v)
}

fn strict_fields() -> bool {
    config::with_current(|c| c.datetime.strict_fields)
}
