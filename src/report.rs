/*!
 * Report assembly
 *
 * Destinations are listed in ascending order and each destination's records
 * in the order their Start lines arrived:
 *
 * ```text
 * Destination: vs1:vol1
 * 	Wed Jul  8 18:27:44 CEST 2020 to Wed Jul  8 18:27:54 CEST 2020 Triggered transferred     1048576 bytes (1024.0kb) in         10s, transfer-speed= 102.4kb/s
 * 	Wed Jul  8 19:00:00 CEST 2020 to Wed Jul  8 19:00:05 CEST 2020 Triggered FAILED: Destination volume is offline (2 resumes)
 * 	Info: Throttle set to 100MB/s
 * ```
 */

use std::io::{self, Write};

use crate::audit::{AuditIndex, AuditRequest};
use crate::core::operation::{AnnotationKind, EndStatus, OperationRecord};
use crate::core::registry::OperationRegistry;
use crate::core::time_codec::{format_duration, format_scaled_magnitude};
use crate::core::RunContext;

/// Rendering switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportOptions {
    /// Leave out every record that did not end in success
    pub skip_failures: bool,
    /// Append raw epoch seconds to timestamps and durations
    pub show_epoch: bool,
}

/// One record as it appears in the report
#[derive(Debug, Clone, Copy)]
pub struct ReportEntry<'a> {
    pub destination: &'a str,
    pub record: &'a OperationRecord,
    /// Matched audit request, if cross-referencing found one
    pub request: Option<&'a AuditRequest>,
}

/// Rendered text of one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEntry {
    pub line: String,
    /// Notes printed on their own lines below the entry
    pub trailing: Vec<String>,
}

/// Walks the registry in report order
pub struct ReportAssembler<'a> {
    registry: &'a OperationRegistry,
    audit: Option<&'a AuditIndex>,
    options: ReportOptions,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(
        registry: &'a OperationRegistry,
        audit: Option<&'a AuditIndex>,
        options: ReportOptions,
    ) -> Self {
        Self {
            registry,
            audit,
            options,
        }
    }

    pub fn from_context(ctx: &'a RunContext) -> Self {
        let options = ReportOptions {
            skip_failures: ctx.config.skip_failures,
            show_epoch: ctx.config.show_epoch(),
        };
        Self::new(&ctx.registry, ctx.audit_index.as_ref(), options)
    }

    /// Destinations in ascending order
    pub fn destinations(&self) -> impl Iterator<Item = &'a str> {
        self.registry.destinations()
    }

    /// Entries of one destination after filtering
    pub fn entries_for(&self, destination: &'a str) -> impl Iterator<Item = ReportEntry<'a>> + '_ {
        self.registry
            .chain(destination)
            .filter(move |record| !self.options.skip_failures || record.is_success())
            .map(move |record| ReportEntry {
                destination,
                record,
                request: self.request_for(record),
            })
    }

    /// Every entry in report order
    pub fn entries(&self) -> impl Iterator<Item = ReportEntry<'a>> + '_ {
        self.destinations()
            .flat_map(move |destination| self.entries_for(destination))
    }

    fn request_for(&self, record: &OperationRecord) -> Option<&'a AuditRequest> {
        let id = record.cross_reference()?;
        self.audit?.get(id)
    }

    /// Write the grouped text report
    pub fn write_human<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for destination in self.destinations() {
            writeln!(out, "Destination: {}", destination)?;
            for entry in self.entries_for(destination) {
                let rendered = self.render(&entry);
                writeln!(out, "\t{}", rendered.line)?;
                for note in &rendered.trailing {
                    writeln!(out, "\t{}", note)?;
                }
            }
        }
        Ok(())
    }

    /// Render one entry without its destination
    pub fn render(&self, entry: &ReportEntry<'_>) -> RenderedEntry {
        let record = entry.record;
        let mut line = String::from(record.start_text());
        if self.options.show_epoch {
            line.push_str(&format!("[{}]", record.start_seconds()));
        }

        if let (Some(end_text), Some(duration)) = (record.end_text(), record.duration_seconds()) {
            if duration >= 0 {
                line.push_str(" to ");
                line.push_str(end_text);
                if let (true, Some(end_seconds)) = (self.options.show_epoch, record.end_seconds()) {
                    line.push_str(&format!("[{}]", end_seconds));
                }
            }
        }

        let label = record.kind().show_label();
        let mut failure_inline = false;
        match (record.status(), label) {
            (EndStatus::Pending, _) => {}
            (EndStatus::Success, Some(label)) => match record.transfer_bytes().known() {
                Some(bytes) => self.push_transfer(&mut line, label, bytes, entry),
                None => line.push_str(&format!(" {}", record.kind())),
            },
            (EndStatus::Failure, Some(label)) => {
                line.push_str(&format!(" {} FAILED", label));
                let message = record
                    .annotations()
                    .iter()
                    .find(|note| note.kind == AnnotationKind::Failure)
                    .map(|note| note.text.as_str())
                    .unwrap_or_default();
                if !message.is_empty() {
                    line.push_str(": ");
                    line.push_str(message);
                }
                failure_inline = true;
            }
            (_, None) => line.push_str(&format!(" {}", record.kind())),
        }

        if record.resume_count() > 0 {
            line.push_str(&format!(" ({} resumes)", record.resume_count()));
        }

        let trailing = record
            .annotations()
            .iter()
            .filter(|note| !(failure_inline && note.kind == AnnotationKind::Failure))
            .map(ToString::to_string)
            .collect();

        RenderedEntry { line, trailing }
    }

    fn push_transfer(&self, line: &mut String, label: &str, bytes: u64, entry: &ReportEntry<'_>) {
        let record = entry.record;
        let seconds = record.duration_seconds().unwrap_or_default();
        let size = format!("{}b", format_scaled_magnitude(bytes as f64));
        line.push_str(&format!(
            " {} transferred {:>11} bytes ({:>8}) in {:>11}",
            label,
            bytes,
            size,
            format_duration(seconds)
        ));
        if self.options.show_epoch {
            line.push_str(&format!("[{:>6} seconds]", seconds));
        }
        let rate = match record.throughput() {
            Some(rate) => format!("{}b/s", format_scaled_magnitude(rate)),
            None => "-".to_string(),
        };
        line.push_str(&format!(", transfer-speed={:>10}", rate));

        if let Some(summary) = entry.request.and_then(AuditRequest::summary) {
            line.push_str(" REQ: ");
            line.push_str(&summary);
        }
    }
}
