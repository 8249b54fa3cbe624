//! Type descriptors - one immutable record per wrapped type
//!
//! Design: descriptors live in a static table indexed by `HandleTag`, so they
//! are built at compile time, shared by every thread without locking and never
//! torn down. A descriptor's reclaim operation is the only path that takes a
//! handle of its type back from foreign code.

use core::ptr::NonNull;
use std::fmt;

use super::handle::Handle;

/// Identity of a wrapped type, stored with every live handle
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleTag {
    Error = 0,
    DateTime = 1,
}

impl HandleTag {
    pub const ALL: [HandleTag; 2] = [HandleTag::Error, HandleTag::DateTime];

    /// Descriptor singleton for this tag
    #[inline]
    pub fn descriptor(self) -> &'static TypeDescriptor {
        &DESCRIPTORS[self as usize]
    }

    /// Foreign-visible type name
    #[inline]
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }
}

impl fmt::Display for HandleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-type metadata shared by all handles of that type
pub struct TypeDescriptor {
    pub tag: HandleTag,
    pub name: &'static str,
    reclaim: unsafe fn(&'static TypeDescriptor, NonNull<Handle>) -> Box<Handle>,
}

impl TypeDescriptor {
    const fn new(tag: HandleTag, name: &'static str) -> Self {
        Self { tag, name, reclaim: reclaim_boxed }
    }

    /// Take ownership of a handle back through this descriptor.
    ///
    /// # Safety
    /// - `handle` must come from `Box::into_raw` in the registry and must
    ///   not have been reclaimed before
    /// - the caller must already have removed it from the liveness ledger
    pub(crate) unsafe fn reclaim(&'static self, handle: NonNull<Handle>) -> Box<Handle> {
        (self.reclaim)(self, handle)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .finish()
    }
}

static DESCRIPTORS: [TypeDescriptor; 2] = [
    TypeDescriptor::new(HandleTag::Error, "tc_error"),
    TypeDescriptor::new(HandleTag::DateTime, "tc_datetime"),
];

unsafe fn reclaim_boxed(descriptor: &'static TypeDescriptor, handle: NonNull<Handle>) -> Box<Handle> {
    // Re-check the descriptor recorded at wrap time before touching the payload.
    if !std::ptr::eq(handle.as_ref().descriptor, descriptor) {
        super::contract_violation(
            "release",
            handle.as_ptr() as usize,
            format!(
                "descriptor mismatch: releasing as {} but handle was created as {}",
                descriptor.name,
                handle.as_ref().descriptor.name
            ),
        );
    }

    Box::from_raw(handle.as_ptr())
}
