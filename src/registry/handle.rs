//! Handle layout and the `Wrapped` binding between internal and foreign types

use super::descriptor::{HandleTag, TypeDescriptor};
use crate::capi::error::ErrorValue;
use crate::datetime::FlexDateTime;

/// Heap record behind every foreign pointer.
///
/// Foreign code only ever sees `*mut tc_xxx`; the registry casts that back
/// to `*mut Handle`. The descriptor comes first so its position is the same
/// for every wrapped type.
#[repr(C)]
pub struct Handle {
    pub(crate) descriptor: &'static TypeDescriptor,
    pub(crate) value: WrappedValue,
}

impl Handle {
    pub(crate) fn new<T: Wrapped>(value: T) -> Self {
        Self {
            descriptor: T::TAG.descriptor(),
            value: value.into_wrapped(),
        }
    }
}

/// Owned payload, one variant per wrapped type
#[derive(Debug)]
pub enum WrappedValue {
    Error(ErrorValue),
    DateTime(FlexDateTime),
}

impl WrappedValue {
    pub fn tag(&self) -> HandleTag {
        match self {
            Self::Error(_) => HandleTag::Error,
            Self::DateTime(_) => HandleTag::DateTime,
        }
    }
}

/// Internal value type that can be handed across the boundary.
///
/// `Foreign` is the opaque struct name foreign callers hold pointers to.
pub trait Wrapped: Sized + 'static {
    const TAG: HandleTag;
    type Foreign;

    fn into_wrapped(self) -> WrappedValue;
    fn project(value: &WrappedValue) -> Option<&Self>;
    fn project_mut(value: &mut WrappedValue) -> Option<&mut Self>;
}

impl Wrapped for FlexDateTime {
    const TAG: HandleTag = HandleTag::DateTime;
    type Foreign = crate::capi::tc_datetime;

    fn into_wrapped(self) -> WrappedValue {
        WrappedValue::DateTime(self)
    }

    fn project(value: &WrappedValue) -> Option<&Self> {
        match value {
            WrappedValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    fn project_mut(value: &mut WrappedValue) -> Option<&mut Self> {
        match value {
            WrappedValue::DateTime(dt) => Some(dt),
            _ => None,
        }
    }
}

impl Wrapped for ErrorValue {
    const TAG: HandleTag = HandleTag::Error;
    type Foreign = crate::capi::tc_error;

    fn into_wrapped(self) -> WrappedValue {
        WrappedValue::Error(self)
    }

    fn project(value: &WrappedValue) -> Option<&Self> {
        match value {
            WrappedValue::Error(err) => Some(err),
            _ => None,
        }
    }

    fn project_mut(value: &mut WrappedValue) -> Option<&mut Self> {
        match value {
            WrappedValue::Error(err) => Some(err),
            _ => None,
        }
    }
}
