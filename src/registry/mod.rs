//! Handle registry - wrap, verified unwrap and release of opaque handles
//!
//! Design: indirect ownership with enumerated tags:
//! 1. Every handle is one boxed `Handle` (descriptor + owned payload)
//! 2. Unwrap checks the tag before projecting, never reinterprets blindly
//! 3. A liveness ledger keyed by address rejects stale or foreign pointers
//!    before any memory behind them is read
//! 4. Release goes through the handle's descriptor; misuse aborts
//! 5. Released allocations sit in a bounded quarantine before being freed,
//!    so a stale pointer cannot alias a newer handle while it is held
//!
//! Each handle has one logical owner. The registry does not serialize access
//! to a single handle: callers must not use the same handle from two threads
//! at once. Distinct handles are independent.

mod descriptor;
mod handle;


pub use descriptor::{HandleTag, TypeDescriptor};
pub use handle::{Handle, Wrapped, WrappedValue};

use core::ffi::c_void;
use core::ptr::NonNull;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::error::{CapiError, CapiResult};
use crate::logging::{log_contract_violation, log_handle_release, log_handle_wrap};

/// Address -> tag of every handle that has been wrapped and not yet released
static LIVE: Lazy<DashMap<usize, HandleTag>> = Lazy::new(DashMap::new);

/// Number of released handles whose memory is held back from the allocator.
///
/// A double release is detected as long as the address is still in here;
/// once it has been evicted the allocator may hand it to a new handle.
pub const QUARANTINE_CAPACITY: usize = 4096;

/// Released handles, oldest first
static QUARANTINE: Lazy<Mutex<VecDeque<Box<Handle>>>> =
    Lazy::new(|| Mutex::new(VecDeque::with_capacity(QUARANTINE_CAPACITY)));

/// Move `value` into a new handle owned by the caller
pub fn wrap<T: Wrapped>(value: T) -> *mut T::Foreign {
    let ptr = Box::into_raw(Box::new(Handle::new(value)));
    LIVE.insert(ptr as usize, T::TAG);
    log_handle_wrap(T::TAG, ptr as usize);
    ptr.cast()
}

/// Run `f` on the value behind `ptr` after verifying its type.
///
/// The reference handed to `f` cannot outlive the call.
pub fn with_value<T, R>(ptr: *const T::Foreign, f: impl FnOnce(&T) -> R) -> CapiResult<R>
where
    T: Wrapped,
{
    let handle = verify::<T>(ptr as *const c_void)?;
    // SAFETY: `verify` confirmed the address is a live handle of type T.
    let handle = unsafe { handle.as_ref() };
    let value = T::project(&handle.value).ok_or_else(|| payload_mismatch::<T>(handle))?;
    Ok(f(value))
}

/// Mutable counterpart of [`with_value`]
pub fn with_value_mut<T, R>(ptr: *mut T::Foreign, f: impl FnOnce(&mut T) -> R) -> CapiResult<R>
where
    T: Wrapped,
{
    let mut handle = verify::<T>(ptr as *const c_void)?;
    // SAFETY: live handle of type T; the single-owner rule excludes aliasing.
    let handle = unsafe { handle.as_mut() };
    let found = handle.value.tag();
    match T::project_mut(&mut handle.value) {
        Some(value) => Ok(f(value)),
        None => Err(CapiError::internal(format!(
            "{} handle carries a {} payload",
            T::TAG,
            found
        ))),
    }
}

/// Release a handle that must be of type `T`. Null is a no-op.
///
/// Releasing an unknown address, releasing twice, or releasing a handle of a
/// different type are contract violations and abort the process.
pub fn release<T: Wrapped>(ptr: *mut T::Foreign) {
    let addr = ptr as usize;
    if ptr.is_null() {
        return;
    }

    match LIVE.get(&addr).map(|entry| *entry) {
        Some(tag) if tag == T::TAG => release_any(ptr.cast()),
        Some(tag) => contract_violation(
            "release",
            addr,
            format!("{} destructor called on a {} handle", T::TAG, tag),
        ),
        None => contract_violation("release", addr, "not a live handle (double release?)".into()),
    }
}

/// Release any handle through its own descriptor. Null is a no-op.
///
/// A second release of the same pointer aborts while its allocation is still
/// quarantined (the last [`QUARANTINE_CAPACITY`] releases). Past that window
/// the address may belong to a newer handle and the behavior is undefined.
pub fn release_any(ptr: *mut c_void) {
    let Some(handle) = NonNull::new(ptr as *mut Handle) else {
        return;
    };
    let addr = ptr as usize;

    let Some((_, tag)) = LIVE.remove(&addr) else {
        contract_violation("release", addr, "not a live handle (double release?)".into());
    };

    log_handle_release(tag, addr);
    // SAFETY: the ledger entry proves this address came from `wrap` and has
    // not been released; removing it makes this call the only release.
    let boxed = unsafe { tag.descriptor().reclaim(handle) };
    quarantine(boxed);
}

fn quarantine(handle: Box<Handle>) {
    let evicted = {
        let mut held = QUARANTINE.lock();
        held.push_back(handle);
        if held.len() > QUARANTINE_CAPACITY {
            held.pop_front()
        } else {
            None
        }
    };
    // Payload destructors run outside the lock.
    drop(evicted);
}

/// Number of released handles currently held in quarantine
pub fn quarantined_count() -> usize {
    QUARANTINE.lock().len()
}

/// Whether `ptr` is a handle that has been wrapped and not released
pub fn is_live(ptr: *const c_void) -> bool {
    LIVE.contains_key(&(ptr as usize))
}

/// Tag recorded for a live handle
pub fn tag_of(ptr: *const c_void) -> Option<HandleTag> {
    LIVE.get(&(ptr as usize)).map(|entry| *entry)
}

/// Number of live handles across all types
pub fn live_count() -> usize {
    LIVE.len()
}

fn verify<T: Wrapped>(ptr: *const c_void) -> CapiResult<NonNull<Handle>> {
    let handle = NonNull::new(ptr as *mut Handle)
        .ok_or_else(|| CapiError::null_handle(T::TAG.name()))?;

    // Copy the tag out so the shard lock is dropped before `f` runs.
    let tag = tag_of(ptr).ok_or_else(|| {
        CapiError::internal(format!("{:p} is not a live {} handle", ptr, T::TAG))
    })?;

    if tag != T::TAG {
        return Err(CapiError::type_mismatch(T::TAG.name(), tag.name()));
    }

    // SAFETY: the address is live, so the descriptor field is readable.
    let recorded = unsafe { handle.as_ref().descriptor };
    if !std::ptr::eq(recorded, T::TAG.descriptor()) {
        return Err(CapiError::type_mismatch(T::TAG.name(), recorded.name));
    }

    Ok(handle)
}

fn payload_mismatch<T: Wrapped>(handle: &Handle) -> CapiError {
    CapiError::internal(format!(
        "{} handle carries a {} payload",
        T::TAG,
        handle.value.tag()
    ))
}

/// Log and abort. Used only for misuse that would otherwise corrupt memory.
#[cold]
pub(crate) fn contract_violation(operation: &str, addr: usize, detail: String) -> ! {
    log_contract_violation(operation, addr, &detail);
    std::process::abort()
}
