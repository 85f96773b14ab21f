/*!
 * Configuration types for mirror-speeds
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};

/// Main configuration for a report run
///
/// Every field can come from a TOML file; command line flags are applied on
/// top of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Leave failed operations out of the report
    #[serde(default)]
    pub skip_failures: bool,

    /// Debug diagnostics and their destination (None = off)
    #[serde(default)]
    pub debug: Option<DebugTarget>,

    /// Log level when debug is off
    #[serde(default)]
    pub log_level: LogLevel,

    /// Write diagnostics as JSON to this file instead of the terminal
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Audit-mlog files to cross-reference requests from
    #[serde(default)]
    pub audit_log_paths: Vec<PathBuf>,

    /// Report format
    #[serde(default)]
    pub output: OutputMode,

    /// Print a run summary after the report
    #[serde(default)]
    pub summary: bool,
}

impl ReportConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: ReportConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ReportError::Config(format!("TOML serialize error: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Whether report timestamps carry their epoch seconds
    pub fn show_epoch(&self) -> bool {
        self.debug.is_some()
    }

    /// Effective diagnostic level
    pub fn effective_level(&self) -> tracing::Level {
        if self.debug.is_some() {
            tracing::Level::DEBUG
        } else {
            self.log_level.to_tracing_level()
        }
    }
}

/// Where debug diagnostics go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugTarget {
    /// Standard error, interleaved with nothing
    Stderr,

    /// Standard output, interleaved with the report
    Stdout,
}

/// Report rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Grouped text report
    #[default]
    Human,

    /// One JSON object per operation
    Json,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
