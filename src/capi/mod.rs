//! C API - flat boundary functions over opaque handles
//!
//! Design: every exported function follows one shape:
//! 1. Handles in, plain values out, `tc_error**` slot last
//! 2. The body runs under `guard`, which catches `Err` and panics alike
//! 3. On failure the slot receives a new `tc_error` and the documented
//!    sentinel (null, 0, 0.0) is returned; on success the slot is untouched
//! 4. Destructors take one handle and are the only way to free it

#![allow(non_camel_case_types)]

pub mod datetime;
pub mod error;


use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::config::{self, Config};
use crate::error::{CapiError, CapiResult};
use crate::logging::{self, log_ffi_call, log_ffi_error};
use crate::registry;

pub use self::error::ErrorValue;

/// Opaque foreign type for calendar timestamps
#[repr(C)]
pub struct tc_datetime {
    _private: [u8; 0],
}

/// Opaque foreign type for error values written to `tc_error**` slots
#[repr(C)]
pub struct tc_error {
    _private: [u8; 0],
}

/// Run `body` at the boundary, converting any failure into the error slot
pub(crate) fn guard<R>(
    function: &'static str,
    error: *mut *mut tc_error,
    sentinel: R,
    body: impl FnOnce() -> CapiResult<R>,
) -> R {
    log_ffi_call(function);

    let outcome = panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(CapiError::internal(panic_message(payload.as_ref()))));

    match outcome {
        Ok(value) => value,
        Err(err) => {
            let err = err.in_function(function);
            log_ffi_error(function, &err);
            self::error::set_error(error, err);
            sentinel
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Borrow a C string argument. `Ok(None)` for null.
pub(crate) fn opt_str<'a>(ptr: *const c_char, what: &str) -> CapiResult<Option<&'a str>> {
    if ptr.is_null() {
        return Ok(None);
    }

    // SAFETY: non-null C strings are NUL-terminated per the API contract.
    let c_str = unsafe { CStr::from_ptr(ptr) };
    c_str
        .to_str()
        .map(Some)
        .map_err(|_| CapiError::parse(c_str.to_string_lossy(), format!("{} is not valid UTF-8", what)))
}

/// Hand a Rust string to the caller; free with `tc_string_free`
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    CString::new(s.replace('\0', "?"))
        .unwrap_or_default()
        .into_raw()
}

/// Load configuration from `TCAPI_CONFIG` (or defaults) and start logging.
/// Returns nonzero on success.
#[no_mangle]
pub extern "C" fn tc_initialize(error: *mut *mut tc_error) -> i32 {
    guard("tc_initialize", error, 0, || {
        let config = Config::from_env()?;
        apply(config);
        Ok(1)
    })
}

/// Load configuration from an explicit TOML file and start logging.
/// Returns nonzero on success.
#[no_mangle]
pub extern "C" fn tc_initialize_with_config(path: *const c_char, error: *mut *mut tc_error) -> i32 {
    guard("tc_initialize_with_config", error, 0, || {
        let path = opt_str(path, "Config path")?
            .ok_or_else(|| CapiError::null_handle("Config path"))?;
        let config = Config::load(Path::new(path))?;
        apply(config);
        Ok(1)
    })
}

fn apply(config: Config) {
    logging::init_with_config(logging::LogConfig::from(&config.logging).with_env_overrides());
    config::install(config);
    logging::log_initialized();
}

/// Release any handle through its own type descriptor. Null is a no-op.
///
/// Passing a pointer that is not a live handle aborts the process. A
/// released pointer is only recognized while it is quarantined; see
/// [`registry::release_any`].
#[no_mangle]
pub extern "C" fn tc_release(handle: *mut std::ffi::c_void) {
    registry::release_any(handle);
}

/// Free a string returned by this library. Null is a no-op.
#[no_mangle]
pub extern "C" fn tc_string_free(s: *mut c_char) {
    if !s.is_null() {
        // SAFETY: only pointers from `into_c_string` are accepted.
        unsafe {
            drop(CString::from_raw(s));
        }
    }
}
