/*!
 * Run summary statistics
 */

use std::io::{self, Write};

use serde::Serialize;

use crate::core::operation::EndStatus;
use crate::core::registry::OperationRegistry;
use crate::core::time_codec::{format_duration, format_scaled_magnitude};

/// Totals over every operation of a run
///
/// The report filter does not apply here; failures are always counted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub total_operations: usize,
    pub destinations: usize,
    pub successful: usize,
    pub failed: usize,
    pub pending: usize,
    pub total_bytes: u64,
    /// Seconds spent in transfers that produced a throughput
    pub total_transfer_seconds: i64,
    pub average_speed_bps: Option<f64>,
    pub fastest_speed_bps: Option<f64>,
    pub slowest_speed_bps: Option<f64>,
    pub resumes: u64,
    pub cross_referenced: usize,
}

impl RunSummary {
    /// Calculate statistics from the registry
    pub fn from_registry(registry: &OperationRegistry) -> Self {
        let mut stats = Self {
            total_operations: registry.len(),
            destinations: registry.destinations().count(),
            ..Self::default()
        };

        let mut rated_bytes = 0u64;
        for record in registry.records() {
            match record.status() {
                EndStatus::Success => stats.successful += 1,
                EndStatus::Failure => stats.failed += 1,
                EndStatus::Pending => stats.pending += 1,
            }
            stats.resumes += u64::from(record.resume_count());
            if record.cross_reference().is_some() {
                stats.cross_referenced += 1;
            }

            if !record.is_success() {
                continue;
            }
            let Some(bytes) = record.transfer_bytes().known() else {
                continue;
            };
            stats.total_bytes = stats.total_bytes.saturating_add(bytes);

            // Only transfers with a positive duration have a rate
            if let (Some(speed), Some(seconds)) = (record.throughput(), record.duration_seconds()) {
                rated_bytes = rated_bytes.saturating_add(bytes);
                stats.total_transfer_seconds = stats.total_transfer_seconds.saturating_add(seconds);
                stats.fastest_speed_bps = Some(stats.fastest_speed_bps.map_or(speed, |s| s.max(speed)));
                stats.slowest_speed_bps = Some(stats.slowest_speed_bps.map_or(speed, |s| s.min(speed)));
            }
        }

        if stats.total_transfer_seconds > 0 {
            stats.average_speed_bps = Some(rated_bytes as f64 / stats.total_transfer_seconds as f64);
        }
        stats
    }

    /// Write formatted statistics
    pub fn write_human<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "Run Summary")?;
        writeln!(out, "===========")?;
        writeln!(
            out,
            "Operations: {} across {} destinations",
            self.total_operations, self.destinations
        )?;
        writeln!(out, "  Successful: {}", self.successful)?;
        writeln!(out, "  Failed: {}", self.failed)?;
        writeln!(out, "  Pending: {}", self.pending)?;
        writeln!(
            out,
            "Transferred: {} bytes ({}b)",
            self.total_bytes,
            format_scaled_magnitude(self.total_bytes as f64)
        )?;
        writeln!(
            out,
            "Transfer time: {}",
            format_duration(self.total_transfer_seconds)
        )?;
        for (label, speed) in [
            ("Average speed", self.average_speed_bps),
            ("Fastest transfer", self.fastest_speed_bps),
            ("Slowest transfer", self.slowest_speed_bps),
        ] {
            if let Some(speed) = speed {
                writeln!(out, "{}: {}b/s", label, format_scaled_magnitude(speed))?;
            }
        }
        writeln!(out, "Resumes: {}", self.resumes)?;
        writeln!(out, "Cross-referenced requests: {}", self.cross_referenced)
    }
}
