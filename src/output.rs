//! Report writer supporting JSON Lines and human-readable modes.

use std::io::{self, Write};

use serde::Serialize;

use crate::audit::AuditRequest;
use crate::config::OutputMode;
use crate::core::operation::{Annotation, EndStatus, OperationKind};
use crate::core::time_codec::EpochSeconds;
use crate::report::{ReportAssembler, ReportEntry};
use crate::stats::RunSummary;

/// Structured report entry for JSON output
#[derive(Debug, Serialize)]
pub struct EntryView<'a> {
    pub destination: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<&'a str>,
    pub operation: OperationKind,
    pub operation_id: &'a str,
    pub start: &'a str,
    pub start_seconds: EpochSeconds,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_seconds: Option<EpochSeconds>,
    pub status: EndStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_per_second: Option<f64>,
    pub resumes: u32,
    pub annotations: &'a [Annotation],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<&'a AuditRequest>,
}

impl<'a> From<&ReportEntry<'a>> for EntryView<'a> {
    fn from(entry: &ReportEntry<'a>) -> Self {
        let record = entry.record;
        Self {
            destination: entry.destination,
            source: record.source(),
            operation: record.kind(),
            operation_id: record.id(),
            start: record.start_text(),
            start_seconds: record.start_seconds(),
            end: record.end_text(),
            end_seconds: record.end_seconds(),
            status: record.status(),
            bytes: record.transfer_bytes().known().filter(|_| record.is_success()),
            duration_seconds: record.duration_seconds(),
            bytes_per_second: record.throughput(),
            resumes: record.resume_count(),
            annotations: record.annotations(),
            request: entry.request,
        }
    }
}

/// Writes the report in the configured mode
#[derive(Debug, Clone, Copy)]
pub struct OutputWriter {
    pub mode: OutputMode,
}

impl OutputWriter {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    /// Write every report entry
    pub fn write_report<W: Write>(&self, assembler: &ReportAssembler<'_>, out: &mut W) -> io::Result<()> {
        match self.mode {
            OutputMode::Human => assembler.write_human(out),
            OutputMode::Json => {
                for entry in assembler.entries() {
                    let view = EntryView::from(&entry);
                    serde_json::to_writer(&mut *out, &view)?;
                    writeln!(out)?;
                }
                Ok(())
            }
        }
    }

    /// Write the run summary (for --summary flag)
    pub fn write_summary<W: Write>(&self, summary: &RunSummary, out: &mut W) -> io::Result<()> {
        match self.mode {
            OutputMode::Json => {
                serde_json::to_writer(&mut *out, summary)?;
                writeln!(out)
            }
            OutputMode::Human => summary.write_human(out),
        }
    }
}
