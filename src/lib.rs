//! tcapi - opaque-handle C API over internal value types
//!
//! Foreign callers create, inspect, mutate and destroy values through
//! `tc_*` functions and opaque pointers. Internally every pointer is a
//! registry handle whose type tag is verified on each access; errors come
//! back through `tc_error**` output slots and never unwind across the
//! boundary.

pub mod capi;
pub mod config;
pub mod datetime;
pub mod error;
pub mod logging;
pub mod registry;

// Re-export core types
pub use capi::{tc_datetime, tc_error};
pub use config::Config;
pub use datetime::{DateTimeReader, FlexDateTime};
pub use error::{CapiError, CapiResult, ErrorKind};
pub use registry::{HandleTag, TypeDescriptor, Wrapped};
