/*!
 * mirror-speeds - SnapMirror transfer speed report
 *
 * Correlates the Start, Defer, Info and End lines of ONTAP SnapMirror audit
 * logs into one record per replication operation and reports, per
 * destination:
 * - transferred bytes, elapsed time and throughput
 * - failures and informational notes
 * - resumes after timeouts
 * - who requested an update, when an audit-mlog is supplied
 */

pub mod audit;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod output;
pub mod report;
pub mod stats;

// Re-export commonly used types
pub use audit::{AuditIndex, AuditRequest};
pub use config::{DebugTarget, LogLevel, OutputMode, ReportConfig};
pub use crate::core::operation::{EndStatus, OperationKind, OperationRecord, TransferBytes};
pub use crate::core::registry::{OperationRegistry, Transition};
pub use crate::core::time_codec::{format_duration, format_scaled_magnitude, parse_timestamp, EpochSeconds};
pub use crate::core::RunContext;
pub use error::{ReportError, Result};
pub use output::OutputWriter;
pub use report::{ReportAssembler, ReportOptions};
pub use stats::RunSummary;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
