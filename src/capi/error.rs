//! Error handles - the carrier behind every `tc_error**` output slot

use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use super::tc_error;
use crate::error::CapiError;
use crate::registry;

/// Error payload plus its pre-rendered message, kept alive with the handle
#[derive(Debug)]
pub struct ErrorValue {
    error: CapiError,
    message: CString,
}

impl ErrorValue {
    pub fn new(error: CapiError) -> Self {
        let message = CString::new(error.to_string().replace('\0', "?")).unwrap_or_default();
        Self { error, message }
    }

    pub fn error(&self) -> &CapiError {
        &self.error
    }

    pub fn message(&self) -> &str {
        self.message.to_str().unwrap_or_default()
    }
}

/// Write a new error handle into `slot`. A null slot drops the error.
///
/// An existing handle in the slot is overwritten, not freed: callers pass a
/// slot initialized to null.
pub(crate) fn set_error(slot: *mut *mut tc_error, error: CapiError) {
    if slot.is_null() {
        return;
    }

    let handle = registry::wrap(ErrorValue::new(error));
    // SAFETY: non-null slot is a writable `tc_error*` per the API contract.
    unsafe {
        *slot = handle;
    }
}

/// Human-readable message, valid until the error is destroyed.
/// Null for a null or non-error handle.
#[no_mangle]
pub extern "C" fn tc_error_message(error: *const tc_error) -> *const c_char {
    registry::with_value::<ErrorValue, _>(error, |value| value.message.as_ptr()).unwrap_or(ptr::null())
}

/// Numeric kind: 1 null handle, 2 type mismatch, 3 parse error,
/// 4 out of range, 5 internal failure; 0 for a null or non-error handle
#[no_mangle]
pub extern "C" fn tc_error_code(error: *const tc_error) -> i32 {
    registry::with_value::<ErrorValue, _>(error, |value| value.error.code()).unwrap_or(0)
}

#[no_mangle]
pub extern "C" fn tc_error_destroy(error: *mut tc_error) {
    registry::release::<ErrorValue>(error);
}
