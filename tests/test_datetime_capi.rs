use std::ffi::{CStr, CString};
use std::ptr;

use proptest::prelude::*;
use tcapi::capi::datetime::*;
use tcapi::capi::error::{tc_error_code, tc_error_destroy, tc_error_message};
use tcapi::capi::{tc_datetime, tc_error, tc_string_free};

const NULL_HANDLE: i32 = 1;
const TYPE_MISMATCH: i32 = 2;
const PARSE_ERROR: i32 = 3;
const OUT_OF_RANGE: i32 = 4;

/// Collects the error slot for one call and frees it
struct Slot(*mut tc_error);

impl Slot {
    fn new() -> Self {
        Slot(ptr::null_mut())
    }

    fn ptr(&mut self) -> *mut *mut tc_error {
        &mut self.0
    }

    fn assert_clear(&self) {
        assert!(self.0.is_null(), "unexpected error: {}", self.message());
    }

    fn code(&self) -> i32 {
        tc_error_code(self.0)
    }

    fn message(&self) -> String {
        let msg = tc_error_message(self.0);
        if msg.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
    }

    fn take_code(&mut self) -> i32 {
        let code = self.code();
        tc_error_destroy(self.0);
        self.0 = ptr::null_mut();
        code
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        tc_error_destroy(self.0);
    }
}

fn from_seconds(seconds: i64) -> *mut tc_datetime {
    let mut slot = Slot::new();
    let dt = tc_datetime_create_from_posix_timestamp(seconds, slot.ptr());
    slot.assert_clear();
    dt
}

fn from_parts(seconds: i64, micros: u64, hours: i64, quarters: i64) -> *mut tc_datetime {
    let mut slot = Slot::new();
    let dt = from_seconds(seconds);
    tc_datetime_set_microsecond(dt, micros, slot.ptr());
    tc_datetime_set_time_zone_offset(dt, hours, quarters, slot.ptr());
    slot.assert_clear();
    dt
}

fn parse(text: &str, format: Option<&str>) -> (*mut tc_datetime, Slot) {
    let text = CString::new(text).unwrap();
    let format = format.map(|f| CString::new(f).unwrap());
    let mut slot = Slot::new();
    let dt = tc_datetime_create_from_string(
        text.as_ptr(),
        format.as_ref().map_or(ptr::null(), |f| f.as_ptr()),
        slot.ptr(),
    );
    (dt, slot)
}

#[test]
fn test_create_empty() {
    let mut slot = Slot::new();
    let dt = tc_datetime_create_empty(slot.ptr());
    assert!(!dt.is_null());
    assert_eq!(tc_datetime_get_timestamp(dt, slot.ptr()), 0);
    assert_eq!(tc_datetime_get_microsecond(dt, slot.ptr()), 0);
    assert_eq!(tc_datetime_get_time_zone_offset_minutes(dt, slot.ptr()), 0);
    slot.assert_clear();
    tc_datetime_destroy(dt);
}

#[test]
fn test_text_scenario_default_pattern() {
    let (dt, slot) = parse("2020-01-15 08:30:00", None);
    slot.assert_clear();

    let mut slot = Slot::new();
    assert_eq!(tc_datetime_get_timestamp(dt, slot.ptr()), 1_579_077_000);
    assert_eq!(tc_datetime_get_microsecond(dt, slot.ptr()), 0);
    assert_eq!(tc_datetime_get_time_zone_offset_minutes(dt, slot.ptr()), 0);
    slot.assert_clear();
    tc_datetime_destroy(dt);
}

#[test]
fn test_text_with_pattern_and_offset() {
    let (dt, slot) = parse("15/01/2020 10:45 +0215", Some("%d/%m/%Y %H:%M %z"));
    slot.assert_clear();

    let mut slot = Slot::new();
    assert_eq!(tc_datetime_get_timestamp(dt, slot.ptr()), 1_579_077_000);
    assert_eq!(tc_datetime_get_time_zone_offset_minutes(dt, slot.ptr()), 135);
    slot.assert_clear();
    tc_datetime_destroy(dt);
}

#[test]
fn test_text_errors() {
    for text in ["", "not a date", "2020-02-30 00:00:00"] {
        let (dt, mut slot) = parse(text, None);
        assert!(dt.is_null(), "{text:?}");
        assert_eq!(slot.take_code(), PARSE_ERROR, "{text:?}");
    }

    let mut slot = Slot::new();
    let dt = tc_datetime_create_from_string(ptr::null(), ptr::null(), slot.ptr());
    assert!(dt.is_null());
    assert_eq!(slot.code(), PARSE_ERROR);
    assert!(slot.message().contains("tc_datetime_create_from_string"));
}

#[test]
fn test_timezone_offset_encoding() {
    let mut slot = Slot::new();
    let dt = from_seconds(0);

    tc_datetime_set_time_zone_offset(dt, 2, 1, slot.ptr());
    assert_eq!(tc_datetime_get_time_zone_offset_minutes(dt, slot.ptr()), 135);

    tc_datetime_set_time_zone_offset(dt, -3, -2, slot.ptr());
    assert_eq!(tc_datetime_get_time_zone_offset_minutes(dt, slot.ptr()), -210);
    slot.assert_clear();

    tc_datetime_set_time_zone_offset(dt, i64::MAX, 0, slot.ptr());
    assert_eq!(slot.take_code(), OUT_OF_RANGE);
    assert_eq!(tc_datetime_get_time_zone_offset_minutes(dt, slot.ptr()), -210);

    tc_datetime_destroy(dt);
}

#[test]
fn test_permissive_setters() {
    let mut slot = Slot::new();
    let dt = from_seconds(0);

    tc_datetime_set_microsecond(dt, 5_000_000, slot.ptr());
    assert_eq!(tc_datetime_get_microsecond(dt, slot.ptr()), 5_000_000);

    tc_datetime_set_time_zone_offset(dt, 20, 0, slot.ptr());
    assert_eq!(tc_datetime_get_time_zone_offset_minutes(dt, slot.ptr()), 1200);
    slot.assert_clear();

    tc_datetime_destroy(dt);
}

#[test]
fn test_seconds_and_highres_accessors() {
    let mut slot = Slot::new();
    let dt = tc_datetime_create_empty(slot.ptr());

    tc_datetime_set_timestamp(dt, -86_400, slot.ptr());
    assert_eq!(tc_datetime_get_timestamp(dt, slot.ptr()), -86_400);

    tc_datetime_set_highres_timestamp(dt, 12.5, slot.ptr());
    assert_eq!(tc_datetime_get_timestamp(dt, slot.ptr()), 12);
    assert_eq!(tc_datetime_get_microsecond(dt, slot.ptr()), 500_000);
    assert_eq!(tc_datetime_get_highres_timestamp(dt, slot.ptr()), 12.5);
    slot.assert_clear();

    tc_datetime_set_highres_timestamp(dt, f64::NAN, slot.ptr());
    assert_eq!(slot.take_code(), OUT_OF_RANGE);
    assert_eq!(tc_datetime_get_timestamp(dt, slot.ptr()), 12);

    let bad = tc_datetime_create_from_posix_highres_timestamp(f64::INFINITY, slot.ptr());
    assert!(bad.is_null());
    assert_eq!(slot.take_code(), OUT_OF_RANGE);

    tc_datetime_destroy(dt);
}

#[test]
fn test_equality_ignores_offset() {
    let mut slot = Slot::new();
    let a = from_parts(1_000, 25, 0, 0);
    let b = from_parts(1_000, 25, 5, 2);

    assert_eq!(tc_datetime_equal(a, b, slot.ptr()), 1);
    assert_eq!(tc_datetime_less_than(a, b, slot.ptr()), 0);
    assert_eq!(tc_datetime_less_than(b, a, slot.ptr()), 0);
    slot.assert_clear();

    tc_datetime_destroy(a);
    tc_datetime_destroy(b);
}

#[test]
fn test_ordering_by_microseconds() {
    let mut slot = Slot::new();
    let a = from_parts(1_000, 1, 0, 0);
    let b = from_parts(1_000, 2, -12, 0);

    assert_eq!(tc_datetime_less_than(a, b, slot.ptr()), 1);
    assert_eq!(tc_datetime_less_than(b, a, slot.ptr()), 0);
    assert_eq!(tc_datetime_equal(a, b, slot.ptr()), 0);
    slot.assert_clear();

    tc_datetime_destroy(a);
    tc_datetime_destroy(b);
}

#[test]
fn test_clone_is_independent() {
    let mut slot = Slot::new();
    let original = from_parts(10, 20, 1, 0);
    let copy = tc_datetime_clone(original, slot.ptr());
    slot.assert_clear();
    assert_ne!(original, copy);

    assert_eq!(tc_datetime_equal(original, copy, slot.ptr()), 1);
    assert_eq!(tc_datetime_get_time_zone_offset_minutes(copy, slot.ptr()), 60);

    tc_datetime_set_timestamp(copy, 11, slot.ptr());
    assert_eq!(tc_datetime_get_timestamp(original, slot.ptr()), 10);
    slot.assert_clear();

    tc_datetime_destroy(original);
    tc_datetime_destroy(copy);
}

#[test]
fn test_to_string() {
    let mut slot = Slot::new();
    let dt = from_parts(1_579_077_000, 0, 2, 1);

    let s = tc_datetime_to_string(dt, ptr::null(), slot.ptr());
    slot.assert_clear();
    assert_eq!(
        unsafe { CStr::from_ptr(s) }.to_str().unwrap(),
        "2020-01-15T10:45:00.000000+02:15"
    );
    tc_string_free(s);

    let format = CString::new("%H:%M").unwrap();
    let s = tc_datetime_to_string(dt, format.as_ptr(), slot.ptr());
    assert_eq!(unsafe { CStr::from_ptr(s) }.to_str().unwrap(), "10:45");
    tc_string_free(s);

    tc_datetime_destroy(dt);
}

#[test]
fn test_every_operation_rejects_null() {
    let null = ptr::null_mut::<tc_datetime>();
    let mut slot = Slot::new();

    macro_rules! expect_null_handle {
        ($call:expr, $sentinel:expr) => {{
            let got = $call;
            assert_eq!(got, $sentinel, "{}", stringify!($call));
            assert_eq!(slot.take_code(), NULL_HANDLE, "{}", stringify!($call));
        }};
    }

    expect_null_handle!(tc_datetime_set_time_zone_offset(null, 1, 0, slot.ptr()), ());
    expect_null_handle!(tc_datetime_get_time_zone_offset_minutes(null, slot.ptr()), 0);
    expect_null_handle!(tc_datetime_set_microsecond(null, 1, slot.ptr()), ());
    expect_null_handle!(tc_datetime_get_microsecond(null, slot.ptr()), 0);
    expect_null_handle!(tc_datetime_set_timestamp(null, 1, slot.ptr()), ());
    expect_null_handle!(tc_datetime_get_timestamp(null, slot.ptr()), 0);
    expect_null_handle!(tc_datetime_set_highres_timestamp(null, 1.5, slot.ptr()), ());
    expect_null_handle!(tc_datetime_get_highres_timestamp(null, slot.ptr()), 0.0);
    expect_null_handle!(tc_datetime_clone(null, slot.ptr()), ptr::null_mut());
    expect_null_handle!(tc_datetime_to_string(null, ptr::null(), slot.ptr()), ptr::null_mut());

    let dt = from_seconds(1);
    expect_null_handle!(tc_datetime_less_than(null, dt, slot.ptr()), 0);
    expect_null_handle!(tc_datetime_less_than(dt, null, slot.ptr()), 0);
    expect_null_handle!(tc_datetime_equal(null, dt, slot.ptr()), 0);
    expect_null_handle!(tc_datetime_equal(dt, null, slot.ptr()), 0);
    tc_datetime_destroy(dt);

    // Destroying null is a no-op.
    tc_datetime_destroy(null);
}

#[test]
fn test_error_handle_used_as_datetime() {
    let (dt, mut slot) = parse("garbage", None);
    assert!(dt.is_null());
    let err = slot.0;

    let mut second = Slot::new();
    let got = tc_datetime_get_timestamp(err as *const tc_datetime, second.ptr());
    assert_eq!(got, 0);
    assert_eq!(second.code(), TYPE_MISMATCH);
    assert!(second.message().contains("expected tc_datetime"));
    assert!(second.message().contains("found tc_error"));

    // Original error is still intact.
    assert_eq!(slot.take_code(), PARSE_ERROR);
}

proptest! {
    #[test]
    fn prop_seconds_round_trip(seconds in any::<i64>()) {
        let mut slot = Slot::new();
        let dt = tc_datetime_create_from_posix_timestamp(seconds, slot.ptr());
        prop_assert_eq!(tc_datetime_get_timestamp(dt, slot.ptr()), seconds);
        prop_assert_eq!(tc_datetime_get_microsecond(dt, slot.ptr()), 0);
        prop_assert!(slot.0.is_null());
        tc_datetime_destroy(dt);
    }

    #[test]
    fn prop_seconds_and_micros(seconds in any::<i64>(), micros in 0u64..1_000_000) {
        let mut slot = Slot::new();
        let dt = tc_datetime_create_from_posix_timestamp(seconds, slot.ptr());
        tc_datetime_set_microsecond(dt, micros, slot.ptr());
        prop_assert_eq!(tc_datetime_get_timestamp(dt, slot.ptr()), seconds);
        prop_assert_eq!(tc_datetime_get_microsecond(dt, slot.ptr()), micros);
        tc_datetime_destroy(dt);
    }

    #[test]
    fn prop_fractional_round_trip(s in -1.0e9f64..1.0e9f64) {
        let mut slot = Slot::new();
        let dt = tc_datetime_create_from_posix_highres_timestamp(s, slot.ptr());
        prop_assert!(slot.0.is_null());

        let back = tc_datetime_get_highres_timestamp(dt, slot.ptr());
        prop_assert!((back - s).abs() <= 1e-6, "{} -> {}", s, back);
        prop_assert!(tc_datetime_get_microsecond(dt, slot.ptr()) < 1_000_000);
        tc_datetime_destroy(dt);
    }

    // Around year 33658 an f64 step is ~122us, so use eighths of a second,
    // which are exact at this magnitude.
    #[test]
    fn prop_fractional_split_far_from_epoch(
        whole in 100_000_000_000i64..1_000_000_000_000,
        eighths in 0i64..8,
        negative in any::<bool>(),
    ) {
        let whole = if negative { -whole } else { whole };
        let s = whole as f64 + eighths as f64 / 8.0;

        let mut slot = Slot::new();
        let dt = tc_datetime_create_from_posix_highres_timestamp(s, slot.ptr());
        prop_assert!(slot.0.is_null());

        prop_assert_eq!(tc_datetime_get_timestamp(dt, slot.ptr()), whole);
        prop_assert_eq!(tc_datetime_get_microsecond(dt, slot.ptr()), (eighths * 125_000) as u64);
        prop_assert_eq!(tc_datetime_get_highres_timestamp(dt, slot.ptr()), s);
        tc_datetime_destroy(dt);
    }

    #[test]
    fn prop_fractional_large_values_keep_micros_in_range(s in 1.0e9f64..1.0e12f64) {
        let mut slot = Slot::new();
        let dt = tc_datetime_create_from_posix_highres_timestamp(s, slot.ptr());
        prop_assert!(slot.0.is_null());

        let seconds = tc_datetime_get_timestamp(dt, slot.ptr());
        let micros = tc_datetime_get_microsecond(dt, slot.ptr());
        prop_assert!(micros < 1_000_000);
        prop_assert!(seconds == s.floor() as i64 || (seconds == s.floor() as i64 + 1 && micros == 0));

        let back = tc_datetime_get_highres_timestamp(dt, slot.ptr());
        prop_assert!((back - s).abs() <= 1e-6 + s * f64::EPSILON, "{} -> {}", s, back);
        tc_datetime_destroy(dt);
    }

    #[test]
    fn prop_ordering_is_strict_weak(
        a in (any::<i32>(), 0u64..1_000_000),
        b in (any::<i32>(), 0u64..1_000_000),
        c in (any::<i32>(), 0u64..1_000_000),
    ) {
        let mut slot = Slot::new();
        let ha = from_parts(i64::from(a.0), a.1, 0, 0);
        let hb = from_parts(i64::from(b.0), b.1, 3, 0);
        let hc = from_parts(i64::from(c.0), c.1, -7, -1);

        fn lt(x: *const tc_datetime, y: *const tc_datetime) -> bool {
            tc_datetime_less_than(x, y, ptr::null_mut()) != 0
        }

        prop_assert!(!lt(ha, ha));
        if lt(ha, hb) && lt(hb, hc) {
            prop_assert!(lt(ha, hc));
        }
        prop_assert_eq!(lt(ha, hb), a < b);
        prop_assert_eq!(tc_datetime_equal(ha, hb, slot.ptr()) != 0, a == b);
        prop_assert!(slot.0.is_null());

        tc_datetime_destroy(ha);
        tc_datetime_destroy(hb);
        tc_datetime_destroy(hc);
    }
}
