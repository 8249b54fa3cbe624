//! Library configuration, loaded from TOML
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "json"
//! file = "/var/log/tcapi/tcapi.log"
//!
//! [datetime]
//! default_format = "%d/%m/%Y %H:%M:%S"
//! strict_fields = true
//! ```

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{CapiError, CapiResult};

/// Environment variable naming the config file read by `tc_initialize`
pub const CONFIG_ENV_VAR: &str = "TCAPI_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub datetime: DateTimeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Log file path; stderr when unset
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateTimeConfig {
    /// Pattern used by `tc_datetime_create_from_string` when the caller
    /// passes none; ISO-8601 when unset
    #[serde(default)]
    pub default_format: Option<String>,

    /// Reject microseconds above 999_999 and offsets outside UTC-12..UTC+14
    #[serde(default = "default_false")]
    pub strict_fields: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> CapiResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CapiError::internal(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> CapiResult<Self> {
        toml::from_str(content)
            .map_err(|e| CapiError::parse("config", e.to_string()))
    }

    /// Load the file named by `TCAPI_CONFIG`, or defaults when unset
    pub fn from_env() -> CapiResult<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.is_empty() => Self::load(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }
}

static CURRENT: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Replace the process-wide configuration
pub fn install(config: Config) {
    *CURRENT.write() = config;
}

/// Snapshot of the process-wide configuration
pub fn current() -> Config {
    CURRENT.read().clone()
}

/// Read the process-wide configuration without cloning it
pub fn with_current<R>(f: impl FnOnce(&Config) -> R) -> R {
    f(&CURRENT.read())
}
