use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Which kind of verification a batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Design-rule check; reports are rule-violation databases.
    Drc,
    /// Layout-versus-schematic; reports are cross-reference databases.
    Lvs,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Drc => "DRC",
            Mode::Lvs => "LVS",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One dispatch of the verification tool for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationJob {
    pub cell: String,
    pub layout: PathBuf,
    pub report: PathBuf,
    pub extras: JobExtras,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobExtras {
    Drc,
    Lvs {
        /// Reference netlist the layout is compared against.
        schematic: PathBuf,
        /// Where the tool writes the extracted netlist.
        target: PathBuf,
    },
}

/// Rule violations of one cell, keyed by display label in order of first
/// occurrence. Counts are always positive, so the total is the sum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViolationReport {
    by_rule: IndexMap<String, usize>,
}

impl ViolationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` occurrences under `label`. Zero counts are dropped.
    pub fn add(&mut self, label: impl Into<String>, count: usize) {
        if count == 0 {
            return;
        }
        *self.by_rule.entry(label.into()).or_insert(0) += count;
    }

    pub fn total(&self) -> usize {
        self.by_rule.values().sum()
    }

    pub fn by_rule(&self) -> &IndexMap<String, usize> {
        &self.by_rule
    }

    pub fn is_clean(&self) -> bool {
        self.by_rule.is_empty()
    }
}

impl<L: Into<String>> FromIterator<(L, usize)> for ViolationReport {
    fn from_iter<T: IntoIterator<Item = (L, usize)>>(iter: T) -> Self {
        let mut report = ViolationReport::new();
        for (label, count) in iter {
            report.add(label, count);
        }
        report
    }
}

/// Verdict of a netlist comparison. A matched report never carries
/// mismatch entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    matched: bool,
    mismatches: Vec<String>,
}

impl ComparisonReport {
    pub fn matched() -> Self {
        Self {
            matched: true,
            mismatches: Vec::new(),
        }
    }

    pub fn mismatched(mismatches: Vec<String>) -> Self {
        Self {
            matched: false,
            mismatches,
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched
    }

    pub fn mismatches(&self) -> &[String] {
        &self.mismatches
    }

    pub fn into_mismatches(self) -> Vec<String> {
        self.mismatches
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReport {
    Violations(ViolationReport),
    Comparison(ComparisonReport),
}

/// What happened to the tool process. Advisory only: the report file is
/// what decides the disposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Exited { code: Option<i32> },
    TimedOut,
    Aborted,
    LaunchFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureDetail {
    Violations(ViolationReport),
    Mismatches(Vec<String>),
}

impl FailureDetail {
    pub fn issue_count(&self) -> usize {
        match self {
            FailureDetail::Violations(report) => report.total(),
            FailureDetail::Mismatches(items) => items.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorReason {
    NoReport,
    NoSchematic,
    Timeout,
    Aborted,
    ToolFailed(String),
    MalformedReport(String),
    UnreadableReport(String),
    Internal(String),
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorReason::NoReport => f.write_str("no report"),
            ErrorReason::NoSchematic => f.write_str("no schematic"),
            ErrorReason::Timeout => f.write_str("timeout"),
            ErrorReason::Aborted => f.write_str("aborted"),
            ErrorReason::ToolFailed(msg) => write!(f, "tool failed to start: {}", msg),
            ErrorReason::MalformedReport(msg) => write!(f, "malformed report: {}", msg),
            ErrorReason::UnreadableReport(msg) => write!(f, "unreadable report: {}", msg),
            ErrorReason::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl Serialize for ErrorReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellDisposition {
    Clean,
    Failed(FailureDetail),
    Errored(ErrorReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedCell {
    pub cell: String,
    #[serde(flatten)]
    pub detail: FailureDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErroredCell {
    pub cell: String,
    pub reason: ErrorReason,
}

/// Three-bucket tally of a batch, in cell enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub mode: Mode,
    pub total: usize,
    pub clean: Vec<String>,
    pub failed: Vec<FailedCell>,
    pub errored: Vec<ErroredCell>,
}

impl BatchResult {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            total: 0,
            clean: Vec::new(),
            failed: Vec::new(),
            errored: Vec::new(),
        }
    }

    pub fn record(&mut self, cell: impl Into<String>, disposition: CellDisposition) {
        let cell = cell.into();
        self.total += 1;
        match disposition {
            CellDisposition::Clean => self.clean.push(cell),
            CellDisposition::Failed(detail) => self.failed.push(FailedCell { cell, detail }),
            CellDisposition::Errored(reason) => self.errored.push(ErroredCell { cell, reason }),
        }
    }

    /// Errored cells block the run unless `allow_errored` is set.
    pub fn passed(&self, allow_errored: bool) -> bool {
        self.failed.is_empty() && (allow_errored || self.errored.is_empty())
    }

    pub fn exit_code(&self, allow_errored: bool) -> i32 {
        if self.passed(allow_errored) {
            0
        } else {
            1
        }
    }
}
