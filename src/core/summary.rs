//! Console and JSON rendering of per-cell results and the batch summary.

use crate::domain::model::{BatchResult, CellDisposition, FailureDetail, Mode};
use crate::utils::error::{CheckError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

const RULE: &str = "==================================================";

/// Mismatch lines shown per cell before eliding the rest.
pub const MAX_LISTED_MISMATCHES: usize = 10;

pub fn banner(mode: Mode, cell: &str) -> String {
    format!("\n{RULE}\nRunning {} on: {}\n{RULE}", mode, cell)
}

fn write_detail(out: &mut String, detail: &FailureDetail, indent: &str) {
    match detail {
        FailureDetail::Violations(report) => {
            for (rule, count) in report.by_rule() {
                let _ = writeln!(out, "{indent}[{}] {}", count, rule);
            }
        }
        FailureDetail::Mismatches(items) => {
            for item in items.iter().take(MAX_LISTED_MISMATCHES) {
                let _ = writeln!(out, "{indent}{}", item);
            }
            if items.len() > MAX_LISTED_MISMATCHES {
                let _ = writeln!(
                    out,
                    "{indent}... and {} more",
                    items.len() - MAX_LISTED_MISMATCHES
                );
            }
        }
    }
}

fn failure_headline(detail: &FailureDetail) -> String {
    match detail {
        FailureDetail::Violations(report) => format!("{} violation(s)", report.total()),
        FailureDetail::Mismatches(items) => format!("{} issue(s)", items.len()),
    }
}

/// Banner plus outcome for one cell, printed as one block so parallel jobs
/// do not interleave.
pub fn render_cell(mode: Mode, cell: &str, disposition: &CellDisposition) -> String {
    let mut out = banner(mode, cell);
    out.push('\n');
    match disposition {
        CellDisposition::Clean => out.push_str("CLEAN\n"),
        CellDisposition::Failed(detail) => {
            let _ = writeln!(out, "FAILED - {}:", failure_headline(detail));
            write_detail(&mut out, detail, "    ");
        }
        CellDisposition::Errored(reason) => {
            let _ = writeln!(out, "ERROR - {}", reason);
        }
    }
    out
}

pub fn render_summary(result: &BatchResult, allow_errored: bool) -> String {
    let total = result.total;
    let mut out = format!("\n{RULE}\n{} SUMMARY\n{RULE}\n", result.mode);

    let _ = writeln!(out, "Clean: {}/{}", result.clean.len(), total);
    for cell in &result.clean {
        let _ = writeln!(out, "  {}", cell);
    }

    if !result.failed.is_empty() {
        let _ = writeln!(out, "\nFailed: {}/{}", result.failed.len(), total);
        for failed in &result.failed {
            let _ = writeln!(out, "  {}: {}", failed.cell, failure_headline(&failed.detail));
            write_detail(&mut out, &failed.detail, "      ");
        }
    }

    if !result.errored.is_empty() {
        let _ = writeln!(out, "\nErrored: {}/{}", result.errored.len(), total);
        for errored in &result.errored {
            let _ = writeln!(out, "  - {}: {}", errored.cell, errored.reason);
        }
    }

    let verdict = if result.passed(allow_errored) {
        "PASS"
    } else {
        "FAIL"
    };
    let _ = writeln!(out, "\nResult: {}", verdict);
    out
}

#[derive(Debug, Serialize)]
pub struct SummaryDocument<'a> {
    pub generated_at: DateTime<Utc>,
    pub passed: bool,
    pub allow_errored: bool,
    #[serde(flatten)]
    pub result: &'a BatchResult,
}

pub fn write_summary_json(path: &Path, result: &BatchResult, allow_errored: bool) -> Result<()> {
    let document = SummaryDocument {
        generated_at: Utc::now(),
        passed: result.passed(allow_errored),
        allow_errored,
        result,
    };

    let output_error = |source| CheckError::OutputFileError {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(output_error)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&document)?).map_err(output_error)?;
    tracing::debug!("Wrote summary to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ErrorReason;

    fn sample() -> BatchResult {
        let mut result = BatchResult::new(Mode::Drc);
        result.record("INV_X1", CellDisposition::Clean);
        result.record(
            "NAND2_X1",
            CellDisposition::Failed(FailureDetail::Violations(
                [("m1.S: Metal1 spacing", 2)].into_iter().collect(),
            )),
        );
        result.record("BUF_X1", CellDisposition::Errored(ErrorReason::NoReport));
        result
    }

    #[test]
    fn test_render_summary_buckets() {
        let text = render_summary(&sample(), false);

        assert!(text.contains("DRC SUMMARY"));
        assert!(text.contains("Clean: 1/3\n  INV_X1\n"));
        assert!(text.contains("Failed: 1/3\n  NAND2_X1: 2 violation(s)\n      [2] m1.S: Metal1 spacing\n"));
        assert!(text.contains("Errored: 1/3\n  - BUF_X1: no report\n"));
        assert!(text.ends_with("Result: FAIL\n"));
    }

    #[test]
    fn test_render_cell_elides_long_mismatch_lists() {
        let items: Vec<String> = (1..=12).map(|i| format!("Extra net in layout: {}", i)).collect();
        let text = render_cell(
            Mode::Lvs,
            "DFF_X1",
            &CellDisposition::Failed(FailureDetail::Mismatches(items)),
        );

        assert!(text.contains("Running LVS on: DFF_X1"));
        assert!(text.contains("FAILED - 12 issue(s):"));
        assert!(text.contains("Extra net in layout: 10\n"));
        assert!(!text.contains("Extra net in layout: 11\n"));
        assert!(text.contains("... and 2 more"));
    }

    #[test]
    fn test_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/summary.json");

        write_summary_json(&path, &sample(), true).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["passed"], false);
        assert_eq!(json["total"], 3);
        assert_eq!(json["clean"][0], "INV_X1");
        assert_eq!(json["errored"][0]["reason"], "no report");
        assert!(json["generated_at"].is_string());
    }

    #[test]
    fn test_summary_json_write_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let err = write_summary_json(&blocker.join("summary.json"), &sample(), false).unwrap_err();
        assert!(matches!(err, CheckError::OutputFileError { .. }));
        assert_eq!(err.exit_code(), crate::utils::error::EXIT_FATAL);
    }
}
