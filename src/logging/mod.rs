//! Logging infrastructure - structured tracing across the boundary layer
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Level and format from the `[logging]` config section
//! - `TCAPI_LOG_*` environment overrides
//! - Optional non-blocking file output
//! - One-time initialization; later calls are no-ops
//!
//! A host process that already installed a global subscriber keeps it.

use once_cell::sync::OnceCell;
use std::path::Path;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::CapiError;
use crate::registry::HandleTag;

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Flush guard for the file writer, held for the life of the process
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Log file path; stderr when `None`
    pub file: Option<String>,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            file: None,
            show_spans: false,
        }
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: parse_level(&config.level).unwrap_or(Level::INFO),
            format: config.format,
            file: config.file.clone(),
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Apply `TCAPI_LOG_LEVEL`, `TCAPI_LOG_FILE`, `TCAPI_LOG_JSON` and
    /// `TCAPI_LOG_SPANS` on top of this configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(level) = std::env::var("TCAPI_LOG_LEVEL").ok().and_then(|s| parse_level(&s)) {
            self.level = level;
        }

        if let Ok(path) = std::env::var("TCAPI_LOG_FILE") {
            if !path.is_empty() {
                self.file = Some(path);
            }
        }

        if std::env::var("TCAPI_LOG_JSON").is_ok() {
            self.format = LogFormat::Json;
        }

        self.show_spans = self.show_spans || std::env::var("TCAPI_LOG_SPANS").is_ok();
        self
    }
}

fn parse_level(s: &str) -> Option<Level> {
    Level::from_str(s.trim()).ok()
}

/// Initialize logging with custom configuration
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("tcapi={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let writer = match config.file.as_deref().and_then(file_writer) {
            Some(writer) => writer,
            None => BoxMakeWriter::new(std::io::stderr),
        };

        let registry = tracing_subscriber::registry().with(env_filter);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true);

        // Err means the host already installed a subscriber.
        let _ = match config.format {
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            LogFormat::Compact => registry.with(layer.compact()).try_init(),
            LogFormat::Json => registry.with(layer.json()).try_init(),
        };
    });
}

fn file_writer(path: &str) -> Option<BoxMakeWriter> {
    let path = Path::new(path);
    let file_name = path.file_name()?;
    let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    FILE_GUARD.set(guard).ok()?;
    Some(BoxMakeWriter::new(writer))
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Boundary-specific logging functions
// ============================================================================

pub fn log_initialized() {
    use tracing::info;
    info!(event = "initialized", "tcapi initialized");
}

/// Log handle creation
#[inline]
pub fn log_handle_wrap(tag: HandleTag, addr: usize) {
    use tracing::trace;
    trace!(
        event = "handle_wrap",
        handle_type = tag.name(),
        address = format_args!("{:#x}", addr),
        "Handle created"
    );
}

/// Log handle release
#[inline]
pub fn log_handle_release(tag: HandleTag, addr: usize) {
    use tracing::trace;
    trace!(
        event = "handle_release",
        handle_type = tag.name(),
        address = format_args!("{:#x}", addr),
        "Handle released"
    );
}

/// Log boundary function entry
#[inline]
pub fn log_ffi_call(fn_name: &str) {
    use tracing::trace;
    trace!(event = "ffi_call", function = fn_name, "FFI function called");
}

/// Log an error returned through a `tc_error` slot
pub fn log_ffi_error(fn_name: &str, error: &CapiError) {
    use tracing::debug;
    debug!(
        event = "ffi_error",
        function = fn_name,
        code = error.code(),
        error = %error.kind,
        "FFI function error"
    );
}

/// Log misuse that is about to abort the process
pub fn log_contract_violation(operation: &str, addr: usize, detail: &str) {
    use tracing::error;
    error!(
        event = "contract_violation",
        operation = operation,
        address = format_args!("{:#x}", addr),
        detail = detail,
        "Handle contract violated, aborting"
    );
}
