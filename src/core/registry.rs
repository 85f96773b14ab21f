/*!
 * Operation registry: correlates Start, Defer, Info and End lines
 *
 * Records are indexed by operation id and chained per destination in the
 * order their Start lines arrived.
 */

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::debug;

use super::line_parser::LogEvent;
use super::operation::{EndStatus, OperationRecord, RecordError, TransferBytes};
use crate::audit::AuditIndex;

pub const ATTR_OPERATION_ID: &str = "Operation-Uuid";
pub const ATTR_ACTION: &str = "action";
pub const ATTR_SOURCE: &str = "source";
pub const ATTR_DESTINATION: &str = "destination";
pub const ATTR_STATUS: &str = "status";
pub const ATTR_MESSAGE: &str = "message";
pub const ATTR_BYTES_TRANSFERRED: &str = "bytes_transferred";

pub const ACTION_START: &str = "Start";
pub const ACTION_END: &str = "End";
pub const ACTION_DEFER: &str = "Defer";
pub const ACTION_INFO: &str = "Info";

pub const STATUS_SUCCESS: &str = "Success";
pub const STATUS_FAILURE: &str = "Failure";

/// Text of a Defer line that means the operation will be resumed
pub const TIMEOUT_MARKER: &str =
    "CSM: An operation did not complete within the specified timeout window.";

/// A line the registry recognized but could not apply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unable to create operation for '{command}' Start action at {timestamp}: {source}")]
    Start {
        command: String,
        timestamp: String,
        source: RecordError,
    },

    #[error("Unable to set operation '{id}' End action at {timestamp}: transfer length is not a number: {value}")]
    InvalidByteCount {
        id: String,
        timestamp: String,
        value: String,
    },

    #[error("Unable to set operation '{id}' End action to {status:?} at {timestamp}: {source}")]
    End {
        id: String,
        status: EndStatus,
        timestamp: String,
        source: RecordError,
    },
}

/// What a log line did to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Resumed,
    Ended(EndStatus),
    Annotated,
    /// Unknown id, repeated Start, Defer without the timeout marker, ...
    Ignored,
}

/// Every operation seen during one run
#[derive(Debug, Default)]
pub struct OperationRegistry {
    records: Vec<OperationRecord>,
    by_id: HashMap<String, usize>,
    by_destination: BTreeMap<String, Vec<usize>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one parsed log line
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] for lines that reference the registry
    /// but carry invalid data. The registry is left unchanged in that case.
    pub fn apply(&mut self, event: &LogEvent<'_>) -> Result<Transition, RegistryError> {
        let attrs = &event.attributes;
        let Some(id) = attrs.get(ATTR_OPERATION_ID).filter(|id| !id.is_empty()) else {
            return Ok(Transition::Ignored);
        };
        let Some(action) = attrs.get(ATTR_ACTION) else {
            return Ok(Transition::Ignored);
        };

        match action {
            ACTION_START => self.start(event, id),
            ACTION_DEFER => Ok(self.defer(event, id)),
            ACTION_END => self.end(event, id),
            _ if action.starts_with(ACTION_INFO) => Ok(self.info(id, &action[ACTION_INFO.len()..])),
            _ => Ok(Transition::Ignored),
        }
    }

    fn start(&mut self, event: &LogEvent<'_>, id: &str) -> Result<Transition, RegistryError> {
        if self.by_id.contains_key(id) {
            debug!("Ignoring repeated Start for operation {}", id);
            return Ok(Transition::Ignored);
        }
        let Some(destination) = event.attributes.get(ATTR_DESTINATION) else {
            return Ok(Transition::Ignored);
        };

        let mut record = OperationRecord::start(event.command, destination, event.timestamp, id)
            .map_err(|source| RegistryError::Start {
                command: event.command.to_string(),
                timestamp: event.timestamp.to_string(),
                source,
            })?;
        record.set_source(event.attributes.get(ATTR_SOURCE));

        let slot = self.records.len();
        self.records.push(record);
        self.by_id.insert(id.to_string(), slot);
        self.by_destination
            .entry(destination.to_string())
            .or_default()
            .push(slot);
        debug!("Started {} {} for {}", event.command, id, destination);
        Ok(Transition::Started)
    }

    fn defer(&mut self, event: &LogEvent<'_>, id: &str) -> Transition {
        if !event.line.contains(TIMEOUT_MARKER) {
            return Transition::Ignored;
        }
        match self.get_mut(id).map(OperationRecord::record_resume) {
            Some(true) => Transition::Resumed,
            _ => Transition::Ignored,
        }
    }

    fn end(&mut self, event: &LogEvent<'_>, id: &str) -> Result<Transition, RegistryError> {
        let attrs = &event.attributes;
        let timestamp = event.timestamp;
        let Some(record) = self.get_mut(id) else {
            return Ok(Transition::Ignored);
        };
        if record.is_ended() {
            debug!("Ignoring repeated End for operation {}", id);
            return Ok(Transition::Ignored);
        }

        let status = attrs.get(ATTR_STATUS).unwrap_or_default();
        let result = if status.eq_ignore_ascii_case(STATUS_SUCCESS) {
            let bytes = match attrs.get(ATTR_BYTES_TRANSFERRED).filter(|v| !v.is_empty()) {
                None => TransferBytes::Unknown,
                Some(value) => {
                    let bytes = value.parse::<u64>().map_err(|_| RegistryError::InvalidByteCount {
                        id: id.to_string(),
                        timestamp: timestamp.to_string(),
                        value: value.to_string(),
                    })?;
                    TransferBytes::Known(bytes)
                }
            };
            record
                .finish_success(timestamp, bytes)
                .map_err(|source| (EndStatus::Success, source))
                .map(|_| EndStatus::Success)
        } else if status.eq_ignore_ascii_case(STATUS_FAILURE) {
            record
                .finish_failure(timestamp, attrs.get(ATTR_MESSAGE))
                .map_err(|source| (EndStatus::Failure, source))
                .map(|_| EndStatus::Failure)
        } else {
            return Ok(Transition::Ignored);
        };

        result
            .map(Transition::Ended)
            .map_err(|(status, source)| RegistryError::End {
                id: id.to_string(),
                status,
                timestamp: timestamp.to_string(),
                source,
            })
    }

    fn info(&mut self, id: &str, remainder: &str) -> Transition {
        let note = remainder.trim_start();
        let note = note.strip_prefix(':').unwrap_or(note);
        match self.get_mut(id).map(|record| record.annotate(note)) {
            Some(true) => Transition::Annotated,
            _ => Transition::Ignored,
        }
    }

    pub fn get(&self, id: &str) -> Option<&OperationRecord> {
        self.by_id.get(id).map(|&slot| &self.records[slot])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut OperationRecord> {
        let slot = *self.by_id.get(id)?;
        Some(&mut self.records[slot])
    }

    /// Number of distinct operations
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in Start arrival order
    pub fn records(&self) -> impl Iterator<Item = &OperationRecord> {
        self.records.iter()
    }

    /// Destinations in ascending order
    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.by_destination.keys().map(String::as_str)
    }

    /// Records of one destination in Start arrival order
    pub fn chain<'s>(&'s self, destination: &str) -> impl Iterator<Item = &'s OperationRecord> + 's {
        self.by_destination
            .get(destination)
            .into_iter()
            .flatten()
            .map(move |&slot| &self.records[slot])
    }

    /// Look every record up in the audit index, returning how many matched
    pub fn resolve_cross_references(&mut self, index: &AuditIndex) -> usize {
        let mut matched = 0;
        for record in &mut self.records {
            let request = index.lookup(record.start_seconds(), record.destination());
            if request.is_some() {
                matched += 1;
            }
            record.set_cross_reference(request);
        }
        matched
    }
}
