//! Error kinds surfaced through the `tc_error` output slot
//!
//! Nothing in here crosses the boundary directly: the capi guard converts a
//! `CapiError` into a `tc_error` handle and returns the operation's sentinel.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    NullHandle { what: String },
    TypeMismatch { expected: String, found: String },
    ParseError { input: String, reason: String },
    OutOfRange { field: String, value: String },
    InternalFailure { message: String },
}

impl ErrorKind {
    /// Stable numeric code reported by `tc_error_code`
    pub fn code(&self) -> i32 {
        match self {
            Self::NullHandle { .. } => 1,
            Self::TypeMismatch { .. } => 2,
            Self::ParseError { .. } => 3,
            Self::OutOfRange { .. } => 4,
            Self::InternalFailure { .. } => 5,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullHandle { what } => {
                write!(f, "{} argument is null", what)
            }
            Self::TypeMismatch { expected, found } => {
                write!(f, "Handle type mismatch: expected {}, found {}", expected, found)
            }
            Self::ParseError { input, reason } => {
                write!(f, "Cannot parse '{}': {}", input, reason)
            }
            Self::OutOfRange { field, value } => {
                write!(f, "Value {} is out of range for {}", value, field)
            }
            Self::InternalFailure { message } => {
                write!(f, "Internal failure: {}", message)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapiError {
    pub kind: ErrorKind,
    /// Boundary function that produced the error, filled in by the guard
    pub function: Option<&'static str>,
}

impl CapiError {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, function: None }
    }

    pub fn in_function(mut self, function: &'static str) -> Self {
        self.function.get_or_insert(function);
        self
    }

    pub fn null_handle(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::NullHandle { what: what.into() })
    }

    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        })
    }

    pub fn parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError {
            input: input.into(),
            reason: reason.into(),
        })
    }

    pub fn out_of_range(field: impl Into<String>, value: impl fmt::Display) -> Self {
        Self::new(ErrorKind::OutOfRange {
            field: field.into(),
            value: value.to_string(),
        })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalFailure { message: message.into() })
    }

    pub fn code(&self) -> i32 {
        self.kind.code()
    }
}

impl fmt::Display for CapiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.function {
            Some(function) => write!(f, "{}: {}", function, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for CapiError {}

pub type CapiResult<T> = Result<T, CapiError>;
