/*!
 * Audit-mlog cross-reference index
 *
 * The ONTAP command audit log (audit-mlog) records who requested each
 * `snapmirror-update`. Its lines are ` :: ` separated:
 *
 * ```text
 * <id> Wed Jul 08 2020 18:27:44 +02:00 [kern_audit:info:2080] <seq> :: <node>:ontapi :: <ip>:<port> :: <vserver>:<account> :: <netapp ...><snapmirror-update>...</snapmirror-update></netapp> :: Pending
 * ```
 *
 * Requests are indexed by the second they were made. Several requests may
 * share a second; a lookup walks them newest first and picks the one whose
 * destination matches.
 */

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::for_each_line;
use crate::core::operation::AuditRequestId;
use crate::core::time_codec::{parse_timestamp, EpochSeconds, TimestampError};
use crate::error::{ReportError, Result};

/// Payload tag of update requests; update results carry other tags
pub const UPDATE_REQUEST_TAG: &str = "snapmirror-update";

const FIELD_SEPARATOR: &str = " :: ";
const MIN_FIELDS: usize = 5;

const TAG_SOURCE: &str = "source-location";
const TAG_DESTINATION: &str = "destination-location";
const TAG_SNAPSHOT: &str = "source-snapshot";

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Why an update request line was not indexed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditLineError {
    #[error("expected at least 5 ' :: ' separated fields, found {0}")]
    TooFewFields(usize),

    #[error("no 'www ... [' timestamp in '{0}'")]
    NoTimestamp(String),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),

    #[error("empty <snapmirror-update> payload")]
    EmptyPayload,
}

/// One `snapmirror-update` request from the audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRequest {
    /// Request time as written in the log
    pub date_time: String,
    pub request_seconds: EpochSeconds,
    /// Client address without the port
    pub host: Option<String>,
    pub vserver: Option<String>,
    pub account: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub snapshot: Option<String>,
}

impl AuditRequest {
    /// `Snapshot=<s>, Host=<h>, SVM-user=<a>` for the report, if a snapshot was named
    pub fn summary(&self) -> Option<String> {
        let snapshot = self.snapshot.as_deref()?;
        let mut buf = format!("Snapshot={}", snapshot);
        if let Some(host) = &self.host {
            buf.push_str(", Host=");
            buf.push_str(host);
        }
        if let Some(account) = &self.account {
            buf.push_str(", SVM-user=");
            buf.push_str(account);
        }
        Some(buf)
    }
}

/// Parse one audit log line
///
/// Returns `Ok(None)` for lines that are not update requests.
pub fn parse_audit_line(line: &str) -> std::result::Result<Option<AuditRequest>, AuditLineError> {
    let marker = format!("<{}>", UPDATE_REQUEST_TAG);
    if !matches!(line.find(&marker), Some(idx) if idx > 0) {
        return Ok(None);
    }

    let fields = split_fields(line);
    if fields.len() < MIN_FIELDS {
        return Err(AuditLineError::TooFewFields(fields.len()));
    }

    let date_time = request_time(fields[0])
        .ok_or_else(|| AuditLineError::NoTimestamp(fields[0].to_string()))?;
    let request_seconds = parse_timestamp(date_time)?;

    let payload = tag_value(fields[4], UPDATE_REQUEST_TAG)
        .filter(|payload| !payload.is_empty())
        .ok_or(AuditLineError::EmptyPayload)?;

    let host = match fields[2].find(':') {
        Some(idx) if idx > 0 => &fields[2][..idx],
        _ => fields[2],
    };
    let (vserver, account) = match fields[3].find(':') {
        Some(idx) if idx > 0 => (
            Some(fields[3][..idx].to_string()),
            Some(fields[3][idx + 1..].to_string()),
        ),
        _ => (None, None),
    };
    let tag = |name| tag_value(payload, name).map(str::to_string);

    Ok(Some(AuditRequest {
        date_time: date_time.to_string(),
        request_seconds,
        host: Some(host.to_string()),
        vserver,
        account,
        source: tag(TAG_SOURCE),
        destination: tag(TAG_DESTINATION),
        snapshot: tag(TAG_SNAPSHOT),
    }))
}

/// Split on ` :: `, trimming fields and dropping empty ones
fn split_fields(line: &str) -> Vec<&str> {
    line.split(FIELD_SEPARATOR)
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .collect()
}

/// Text from the first weekday abbreviation up to the first `[`
fn request_time(field: &str) -> Option<&str> {
    let start = WEEKDAYS.iter().filter_map(|day| field.find(day)).min()?;
    let end = field.find('[')?;
    (start < end).then(|| field[start..end].trim())
}

/// Text between the first `<name>` and the next `</name>` after it
///
/// Plain substring matching; nested tags of the same name are not understood.
pub fn tag_value<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    let start = xml.find(&open)? + open.len();
    let end = start + xml[start..].find(&close)?;
    Some(&xml[start..end])
}

/// Update requests indexed by request second
#[derive(Debug, Default)]
pub struct AuditIndex {
    requests: Vec<AuditRequest>,
    by_second: HashMap<EpochSeconds, Vec<usize>>,
}

impl AuditIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every update request of an audit log file
    ///
    /// # Errors
    ///
    /// Fails with [`ReportError::AuditLogMissing`] when `path` is not an
    /// existing regular file. A read error part-way through is logged and the
    /// requests indexed up to that point are kept.
    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        if !path.is_file() {
            return Err(ReportError::AuditLogMissing(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|_| ReportError::AuditLogMissing(path.to_path_buf()))?;

        info!("Scanning audit log to store request info: {}", path.display());
        let before = self.len();
        if let Err(e) = self.ingest(BufReader::new(file)) {
            tracing::error!(
                "I/O error reading from audit log {}: {}",
                path.display(),
                e
            );
        }
        let found = self.len() - before;
        info!(
            "Found {} snapmirror-update requests in this audit log.",
            found
        );
        Ok(found)
    }

    /// Index every update request read from `reader`
    pub fn ingest<R: BufRead>(&mut self, reader: R) -> std::io::Result<usize> {
        let mut count = 0;
        for_each_line(reader, |line_num, line| match parse_audit_line(line) {
            Ok(Some(request)) => {
                self.insert(request);
                count += 1;
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping audit log line {}: {}", line_num, e),
        })?;
        Ok(count)
    }

    /// Add a request; it becomes the first candidate for its second
    pub fn insert(&mut self, request: AuditRequest) -> AuditRequestId {
        let slot = self.requests.len();
        debug!(
            "Indexed update request at {} for {:?}",
            request.request_seconds, request.destination
        );
        self.by_second
            .entry(request.request_seconds)
            .or_default()
            .push(slot);
        self.requests.push(request);
        AuditRequestId(slot)
    }

    /// Newest request made in `seconds` for `destination`
    pub fn lookup(&self, seconds: EpochSeconds, destination: &str) -> Option<AuditRequestId> {
        self.by_second
            .get(&seconds)?
            .iter()
            .rev()
            .copied()
            .find(|&slot| self.requests[slot].destination.as_deref() == Some(destination))
            .map(AuditRequestId)
    }

    pub fn get(&self, id: AuditRequestId) -> Option<&AuditRequest> {
        self.requests.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
