use crate::domain::model::{
    CellDisposition, ErrorReason, FailureDetail, JobOutcome, ParsedReport,
};
use crate::parsers::ReportError;

/// Turns a job outcome and its parsed report into the cell's disposition.
///
/// The process outcome only matters when it prevented a report (timeout,
/// abort, launch failure). An exit code alone never fails a cell: the report
/// decides.
pub fn classify(
    outcome: &JobOutcome,
    report: Result<Option<ParsedReport>, ReportError>,
) -> CellDisposition {
    match outcome {
        JobOutcome::TimedOut => return CellDisposition::Errored(ErrorReason::Timeout),
        JobOutcome::Aborted => return CellDisposition::Errored(ErrorReason::Aborted),
        JobOutcome::LaunchFailed { message } => {
            return CellDisposition::Errored(ErrorReason::ToolFailed(message.clone()))
        }
        JobOutcome::Exited { .. } => {}
    }

    match report {
        Err(e @ ReportError::Io { .. }) => {
            CellDisposition::Errored(ErrorReason::UnreadableReport(e.to_string()))
        }
        Err(e) => CellDisposition::Errored(ErrorReason::MalformedReport(e.to_string())),
        Ok(None) => CellDisposition::Errored(ErrorReason::NoReport),
        Ok(Some(ParsedReport::Violations(report))) => {
            if report.total() == 0 {
                CellDisposition::Clean
            } else {
                CellDisposition::Failed(FailureDetail::Violations(report))
            }
        }
        Ok(Some(ParsedReport::Comparison(report))) => {
            if report.is_match() {
                CellDisposition::Clean
            } else {
                CellDisposition::Failed(FailureDetail::Mismatches(report.into_mismatches()))
            }
        }
    }
}
