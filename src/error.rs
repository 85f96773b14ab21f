/*!
 * Error types for mirror-speeds
 *
 * `ReportError` covers the failures that stop a run or a whole input file.
 * Problems with single lines are reported where they happen (see
 * `RegistryError` and `AuditLineError`) and never reach this type.
 */

use std::fmt;
use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ReportError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_BAD_ARGUMENTS: i32 = 5;
pub const EXIT_AUDIT_LOG: i32 = 50;
/// The report could not be written
pub const EXIT_IO_FAILURE: i32 = 1;

#[derive(Debug)]
pub enum ReportError {
    /// Invalid configuration or command line
    Config(String),

    /// Unknown command line option
    UnknownOption(String),

    /// A log file named on the command line does not exist
    LogFileNotFound(PathBuf),

    /// The audit file given for cross-referencing is missing or not a file
    AuditLogMissing(PathBuf),

    /// Reading one log file failed part-way
    LogFile { path: PathBuf, source: io::Error },

    /// I/O error
    Io(io::Error),
}

impl ReportError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ReportError::Config(_)
            | ReportError::UnknownOption(_)
            | ReportError::LogFileNotFound(_) => EXIT_BAD_ARGUMENTS,
            ReportError::AuditLogMissing(_) => EXIT_AUDIT_LOG,
            // only the affected file is abandoned
            ReportError::LogFile { .. } => EXIT_SUCCESS,
            ReportError::Io(_) => EXIT_IO_FAILURE,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReportError::Config(_) | ReportError::UnknownOption(_) => ErrorCategory::Configuration,
            ReportError::LogFileNotFound(_) | ReportError::AuditLogMissing(_) => {
                ErrorCategory::Validation
            }
            ReportError::LogFile { .. } | ReportError::Io(_) => ErrorCategory::IoError,
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad flags, arguments or config file
    Configuration,
    /// Input files that do not exist or have the wrong type
    Validation,
    /// I/O operation errors
    IoError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::IoError => write!(f, "io"),
        }
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Config(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            ReportError::UnknownOption(option) => {
                write!(f, "Unknown option: {}", option)
            }
            ReportError::LogFileNotFound(path) => {
                write!(f, "Given log file does not exist: {}", path.display())
            }
            ReportError::AuditLogMissing(path) => {
                write!(f, "Given audit log file does not exist: {}", path.display())
            }
            ReportError::LogFile { path, source } => {
                write!(f, "I/O error {} reading: {}", source, path.display())
            }
            ReportError::Io(err) => {
                write!(f, "I/O error: {}", err)
            }
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::LogFile { source, .. } => Some(source),
            ReportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ReportError {
    fn from(err: io::Error) -> Self {
        ReportError::Io(err)
    }
}

impl From<toml::de::Error> for ReportError {
    fn from(err: toml::de::Error) -> Self {
        ReportError::Config(format!("TOML parse error: {}", err))
    }
}
