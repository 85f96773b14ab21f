/*!
 * SnapMirror operation records
 */

use serde::Serialize;
use thiserror::Error;

use super::time_codec::{parse_timestamp, EpochSeconds, TimestampError};

/// Errors raised while creating or ending an operation record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Destination path format should be SVM:volume, not: {0}")]
    InvalidDestination(String),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}

/// The replication operations tracked by the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    ManualUpdate,
    ScheduledUpdate,
    DelayedUpdate,
    Initialize,
    StorageEfficientSnapshotRotation,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::ManualUpdate,
        OperationKind::ScheduledUpdate,
        OperationKind::DelayedUpdate,
        OperationKind::Initialize,
        OperationKind::StorageEfficientSnapshotRotation,
    ];

    /// Log command name, e.g. `ManualUpdate`
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::ManualUpdate => "ManualUpdate",
            OperationKind::ScheduledUpdate => "ScheduledUpdate",
            OperationKind::DelayedUpdate => "DelayedUpdate",
            OperationKind::Initialize => "Initialize",
            OperationKind::StorageEfficientSnapshotRotation => "StorageEfficientSnapshotRotation",
        }
    }

    /// Case-insensitive lookup of a log command name
    pub fn from_command(command: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(command))
    }

    /// Report label for kinds that get transfer details, `None` for the others
    pub fn show_label(&self) -> Option<&'static str> {
        match self {
            OperationKind::ManualUpdate => Some("Triggered"),
            OperationKind::ScheduledUpdate => Some("CDOTsched"),
            OperationKind::DelayedUpdate => Some("OTDelayed"),
            OperationKind::Initialize | OperationKind::StorageEfficientSnapshotRotation => None,
        }
    }

    pub fn is_showable(&self) -> bool {
        self.show_label().is_some()
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How an operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndStatus {
    Pending,
    Success,
    Failure,
}

/// Byte count reported by a successful End
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferBytes {
    Known(u64),
    /// The End line carried no byte count
    Unknown,
}

impl TransferBytes {
    pub fn known(&self) -> Option<u64> {
        match self {
            TransferBytes::Known(bytes) => Some(*bytes),
            TransferBytes::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Failure,
    Info,
}

/// Free-text note attached to a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub kind: AnnotationKind,
    pub text: String,
}

impl std::fmt::Display for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.kind {
            AnnotationKind::Failure => "Failure",
            AnnotationKind::Info => "Info",
        };
        if self.text.is_empty() {
            f.write_str(prefix)
        } else {
            write!(f, "{}: {}", prefix, self.text)
        }
    }
}

/// Handle of an entry in an [`AuditIndex`](crate::audit::AuditIndex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuditRequestId(pub(crate) usize);

/// One replication attempt assembled from its Start, Defer, Info and End lines
#[derive(Debug, Clone)]
pub struct OperationRecord {
    kind: OperationKind,
    id: String,
    source: Option<String>,
    destination: String,
    start_text: String,
    start_seconds: EpochSeconds,
    end: Option<(String, EpochSeconds)>,
    status: EndStatus,
    transfer_bytes: TransferBytes,
    resume_count: u32,
    annotations: Vec<Annotation>,
    cross_reference: Option<AuditRequestId>,
}

impl OperationRecord {
    /// Create a record from a Start line
    ///
    /// # Errors
    ///
    /// Fails for an unknown operation command, a destination without a `:`
    /// separator, or an unparsable start timestamp.
    pub fn start(
        command: &str,
        destination: &str,
        timestamp: &str,
        id: &str,
    ) -> Result<Self, RecordError> {
        let kind = OperationKind::from_command(command)
            .ok_or_else(|| RecordError::UnknownOperation(command.to_string()))?;
        if !destination.contains(':') {
            return Err(RecordError::InvalidDestination(destination.to_string()));
        }
        let start_seconds = parse_timestamp(timestamp)?;

        Ok(Self {
            kind,
            id: id.to_string(),
            source: None,
            destination: destination.to_string(),
            start_text: timestamp.to_string(),
            start_seconds,
            end: None,
            status: EndStatus::Pending,
            transfer_bytes: TransferBytes::Unknown,
            resume_count: 0,
            annotations: Vec::new(),
            cross_reference: None,
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source path from the Start line, if it named one
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Start timestamp as it appeared in the log
    pub fn start_text(&self) -> &str {
        &self.start_text
    }

    pub fn start_seconds(&self) -> EpochSeconds {
        self.start_seconds
    }

    pub fn end_text(&self) -> Option<&str> {
        self.end.as_ref().map(|(text, _)| text.as_str())
    }

    pub fn end_seconds(&self) -> Option<EpochSeconds> {
        self.end.as_ref().map(|(_, seconds)| *seconds)
    }

    pub fn status(&self) -> EndStatus {
        self.status
    }

    pub fn is_ended(&self) -> bool {
        self.status != EndStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == EndStatus::Success
    }

    /// Only meaningful once the record ended in success
    pub fn transfer_bytes(&self) -> TransferBytes {
        self.transfer_bytes
    }

    pub fn resume_count(&self) -> u32 {
        self.resume_count
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn cross_reference(&self) -> Option<AuditRequestId> {
        self.cross_reference
    }

    /// `end - start`, which is negative when the log clocks disagree
    pub fn duration_seconds(&self) -> Option<i64> {
        self.end_seconds().map(|end| end - self.start_seconds)
    }

    /// Bytes per second for successful transfers that took at least a second
    pub fn throughput(&self) -> Option<f64> {
        if !self.is_success() {
            return None;
        }
        let bytes = self.transfer_bytes.known()?;
        match self.duration_seconds() {
            Some(seconds) if seconds > 0 => Some(bytes as f64 / seconds as f64),
            _ => None,
        }
    }

    /// End the record in success; a second End is ignored
    pub fn finish_success(
        &mut self,
        timestamp: &str,
        bytes: TransferBytes,
    ) -> Result<bool, RecordError> {
        if self.is_ended() {
            return Ok(false);
        }
        let seconds = parse_timestamp(timestamp)?;
        self.end = Some((timestamp.to_string(), seconds));
        self.transfer_bytes = bytes;
        self.status = EndStatus::Success;
        Ok(true)
    }

    /// End the record in failure; a second End is ignored
    pub fn finish_failure(
        &mut self,
        timestamp: &str,
        message: Option<&str>,
    ) -> Result<bool, RecordError> {
        if self.is_ended() {
            return Ok(false);
        }
        let seconds = parse_timestamp(timestamp)?;
        self.end = Some((timestamp.to_string(), seconds));
        self.status = EndStatus::Failure;
        self.annotations.push(Annotation {
            kind: AnnotationKind::Failure,
            text: message.unwrap_or_default().trim().to_string(),
        });
        Ok(true)
    }

    /// Count a resume after a timeout; ignored once ended
    pub fn record_resume(&mut self) -> bool {
        if self.is_ended() {
            return false;
        }
        self.resume_count += 1;
        true
    }

    /// Append an informational note, in any state; blank notes are dropped
    pub fn annotate(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        self.annotations.push(Annotation {
            kind: AnnotationKind::Info,
            text: text.to_string(),
        });
        true
    }

    pub(crate) fn set_source(&mut self, source: Option<&str>) {
        self.source = source.filter(|s| !s.is_empty()).map(str::to_string);
    }

    pub(crate) fn set_cross_reference(&mut self, request: Option<AuditRequestId>) {
        self.cross_reference = request;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "Wed Jul 8 18:27:44 CEST 2020";
    const END: &str = "Wed Jul 8 18:27:54 CEST 2020";

    fn record() -> OperationRecord {
        OperationRecord::start("ManualUpdate", "vs1:vol1", START, "OP1").unwrap()
    }

    #[test]
    fn test_start_parses_kind_case_insensitively() {
        let rec = OperationRecord::start("scheduledupdate", "vs1:vol1", START, "OP1").unwrap();
        assert_eq!(rec.kind(), OperationKind::ScheduledUpdate);
        assert_eq!(rec.status(), EndStatus::Pending);
        assert_eq!(rec.resume_count(), 0);
        assert_eq!(rec.start_text(), START);
    }

    #[test]
    fn test_start_rejects_bad_input() {
        assert_eq!(
            OperationRecord::start("Resync", "vs1:vol1", START, "OP1").unwrap_err(),
            RecordError::UnknownOperation("Resync".to_string())
        );
        assert_eq!(
            OperationRecord::start("ManualUpdate", "vol1", START, "OP1").unwrap_err(),
            RecordError::InvalidDestination("vol1".to_string())
        );
        assert!(matches!(
            OperationRecord::start("ManualUpdate", "vs1:vol1", "Wed Jul 8 2020", "OP1"),
            Err(RecordError::Timestamp(_))
        ));
    }

    #[test]
    fn test_success_end() {
        let mut rec = record();
        assert!(rec.finish_success(END, TransferBytes::Known(1_048_576)).unwrap());
        assert!(rec.is_success());
        assert_eq!(rec.duration_seconds(), Some(10));
        assert_eq!(rec.throughput(), Some(104_857.6));
    }

    #[test]
    fn test_second_end_is_ignored() {
        let mut rec = record();
        rec.finish_success(END, TransferBytes::Known(100)).unwrap();
        assert!(!rec.finish_failure(END, Some("late")).unwrap());
        assert!(!rec
            .finish_success("Wed Jul 8 19:00:00 CEST 2020", TransferBytes::Known(5))
            .unwrap());
        assert_eq!(rec.transfer_bytes(), TransferBytes::Known(100));
        assert_eq!(rec.end_text(), Some(END));
        assert!(rec.annotations().is_empty());
    }

    #[test]
    fn test_failure_end_records_message() {
        let mut rec = record();
        rec.finish_failure(END, Some("Transfer aborted")).unwrap();
        assert_eq!(rec.status(), EndStatus::Failure);
        assert_eq!(rec.annotations()[0].to_string(), "Failure: Transfer aborted");
        assert_eq!(rec.throughput(), None);
    }

    #[test]
    fn test_negative_duration_has_no_throughput() {
        let mut rec = record();
        rec.finish_success("Wed Jul 8 18:27:40 CEST 2020", TransferBytes::Known(10))
            .unwrap();
        assert_eq!(rec.duration_seconds(), Some(-4));
        assert_eq!(rec.throughput(), None);
    }

    #[test]
    fn test_unknown_bytes_have_no_throughput() {
        let mut rec = record();
        rec.finish_success(END, TransferBytes::Unknown).unwrap();
        assert!(rec.is_success());
        assert_eq!(rec.throughput(), None);
    }

    #[test]
    fn test_resumes_stop_after_end() {
        let mut rec = record();
        assert!(rec.record_resume());
        assert!(rec.record_resume());
        rec.finish_failure(END, None).unwrap();
        assert!(!rec.record_resume());
        assert_eq!(rec.resume_count(), 2);
        assert_eq!(rec.annotations()[0].to_string(), "Failure");
    }

    #[test]
    fn test_annotations_after_end() {
        let mut rec = record();
        rec.finish_success(END, TransferBytes::Known(1)).unwrap();
        assert!(rec.annotate("  cleanup done "));
        assert!(!rec.annotate("   "));
        assert_eq!(rec.annotations().len(), 1);
        assert_eq!(rec.annotations()[0].text, "cleanup done");
    }

    #[test]
    fn test_show_labels() {
        assert_eq!(OperationKind::ManualUpdate.show_label(), Some("Triggered"));
        assert_eq!(OperationKind::ScheduledUpdate.show_label(), Some("CDOTsched"));
        assert_eq!(OperationKind::DelayedUpdate.show_label(), Some("OTDelayed"));
        assert!(!OperationKind::Initialize.is_showable());
        assert!(!OperationKind::StorageEfficientSnapshotRotation.is_showable());
    }
}
