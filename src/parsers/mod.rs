//! Readers for the two report formats the verification tool writes.
//!
//! Both parsers return `Ok(None)` when the report file does not exist: that
//! is how a tool run that produced nothing shows up. Any other problem is a
//! [`ReportError`], which the classifier turns into an errored cell rather
//! than aborting the batch.

pub mod comparison;
pub mod violation;

use crate::domain::model::{Mode, ParsedReport};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use comparison::{parse_comparison_report, parse_comparison_text};
pub use violation::{parse_violation_report, parse_violation_xml};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Malformed { message: String },

    #[error("unrecognized match flag `{flag}` in record `{record}`")]
    Anomaly { record: String, flag: String },
}

/// Reads `path`, mapping a missing file to `Ok(None)`.
pub(crate) fn read_report(path: &Path) -> Result<Option<Vec<u8>>, ReportError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ReportError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parses a report with the parser that belongs to `mode`.
pub fn parse_report(mode: Mode, path: &Path) -> Result<Option<ParsedReport>, ReportError> {
    match mode {
        Mode::Drc => Ok(parse_violation_report(path)?.map(ParsedReport::Violations)),
        Mode::Lvs => Ok(parse_comparison_report(path)?.map(ParsedReport::Comparison)),
    }
}
