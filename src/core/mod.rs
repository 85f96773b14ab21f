/*!
 * Core log correlation
 *
 * `RunContext` owns everything one invocation builds up: the configuration,
 * the operation registry and the optional audit index. Nothing is global.
 */

pub mod line_parser;
pub mod operation;
pub mod registry;
pub mod time_codec;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::audit::AuditIndex;
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};

use line_parser::parse_line;
use registry::{OperationRegistry, Transition};

/// State of one report run
#[derive(Debug)]
pub struct RunContext {
    pub config: ReportConfig,
    pub registry: OperationRegistry,
    pub audit_index: Option<AuditIndex>,
}

impl RunContext {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            registry: OperationRegistry::new(),
            audit_index: None,
        }
    }

    /// Index an audit-mlog file; several files share one index
    pub fn load_audit_log(&mut self, path: &Path) -> Result<usize> {
        self.audit_index
            .get_or_insert_with(AuditIndex::new)
            .load_file(path)
    }

    /// Feed every line of a primary log file into the registry
    ///
    /// # Errors
    ///
    /// [`ReportError::LogFileNotFound`] when `path` does not exist. A
    /// directory, or a read error part-way through, is logged and yields
    /// the number of lines consumed so far; records taken from the file
    /// so far stay in the registry.
    pub fn ingest_log_file(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            return Err(ReportError::LogFileNotFound(path.to_path_buf()));
        }
        if path.is_dir() {
            error!("Given log file is a directory, skipping: {}", path.display());
            return Ok(0);
        }

        let lines = match File::open(path) {
            Ok(file) => {
                let mut lines = 0;
                let result = for_each_line(BufReader::new(file), |line_num, line| {
                    lines = line_num;
                    self.ingest_line(line);
                });
                if let Err(source) = result {
                    let err = ReportError::LogFile {
                        path: path.to_path_buf(),
                        source,
                    };
                    error!("{}", err);
                }
                lines
            }
            Err(source) => {
                error!(
                    "{}",
                    ReportError::LogFile {
                        path: path.to_path_buf(),
                        source,
                    }
                );
                0
            }
        };

        info!(
            "Total operations: {} after loading {}",
            self.registry.len(),
            path.display()
        );
        Ok(lines)
    }

    /// Apply one raw line; unrecognized lines are skipped
    pub fn ingest_line(&mut self, line: &str) -> Transition {
        let Some(event) = parse_line(line) else {
            return Transition::Ignored;
        };
        match self.registry.apply(&event) {
            Ok(transition) => transition,
            Err(e) => {
                warn!("{}", e);
                Transition::Ignored
            }
        }
    }

    /// Attach audit requests to records; 0 when no audit log was loaded
    pub fn resolve_cross_references(&mut self) -> usize {
        let Some(index) = &self.audit_index else {
            return 0;
        };
        let matched = self.registry.resolve_cross_references(index);
        debug!(
            "Cross-referenced {} of {} operations",
            matched,
            self.registry.len()
        );
        matched
    }
}

/// Call `f` with every line of `reader` and its 1-based number
///
/// Lines end at `\n` with an optional `\r` before it and are decoded
/// lossily, so stray bytes never stop a file.
pub fn for_each_line<R, F>(mut reader: R, mut f: F) -> std::io::Result<usize>
where
    R: BufRead,
    F: FnMut(usize, &str),
{
    let mut buf = Vec::with_capacity(512);
    let mut line_num = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(line_num);
        }
        line_num += 1;
        let mut bytes = buf.as_slice();
        if let Some(rest) = bytes.strip_suffix(b"\n") {
            bytes = rest;
        }
        if let Some(rest) = bytes.strip_suffix(b"\r") {
            bytes = rest;
        }
        f(line_num, &String::from_utf8_lossy(bytes));
    }
}
