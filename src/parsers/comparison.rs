//! Netlist cross-reference databases (`.lvsdb`).
//!
//! A structured database starts with [`SIGNATURE`] and holds one `Z(...)`
//! cross-reference section. Inside it every correspondence record reads
//! `Kind(layout_id schematic_id flag)` with `Kind` one of `N` (net),
//! `D` (device) or `P` (pin), and flag `1` for matched, `0` for not. An id of
//! `0` means the element has no counterpart on that side.
//!
//! Some tool versions write a plain-text summary instead. Those are judged by
//! looking for a success phrase.

use super::{read_report, ReportError};
use crate::domain::model::ComparisonReport;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

pub const SIGNATURE: &str = "#%lvsdb-klayout";
pub const SUCCESS_PHRASES: [&str; 2] = ["Congratulations", "netlists match"];
pub const GENERIC_FAILURE: &str = "LVS comparison failed";
pub const NO_SECTION: &str = "No cross-reference section found";
pub const UNCLASSIFIED_MISMATCH: &str = "Unclassified mismatch in cross-reference section";

const SECTION_MARKER: &str = "Z(";
const MISMATCH_FLAG: &str = " 0)";

// The flag is captured loosely so that `X`, `W` or `-1` surface as anomalies
// instead of being skipped.
static RECORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([NDP])\((\d+) (\d+) ([^\s()]+)\)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Net,
    Device,
    Pin,
}

impl Kind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "N" => Some(Kind::Net),
            "D" => Some(Kind::Device),
            "P" => Some(Kind::Pin),
            _ => None,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            Kind::Net => "net",
            Kind::Device => "device",
            Kind::Pin => "pin",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            Kind::Net => "Net",
            Kind::Device => "Device",
            Kind::Pin => "Pin",
        }
    }
}

/// Mismatch entries bucketed so the output order stays stable.
#[derive(Default)]
struct Mismatches {
    nets: Vec<String>,
    devices: Vec<String>,
    pins: Vec<String>,
    extra_nets: Vec<String>,
    missing_nets: Vec<String>,
    extra_devices: Vec<String>,
    missing_devices: Vec<String>,
}

impl Mismatches {
    fn push(&mut self, kind: Kind, layout: &str, schematic: &str) {
        let pair = format!(
            "{} mismatch: layout {noun} {} vs schematic {noun} {}",
            kind.title(),
            layout,
            schematic,
            noun = kind.noun()
        );

        match (kind, is_sentinel(layout), is_sentinel(schematic)) {
            (Kind::Pin, _, _) => self.pins.push(pair),
            (Kind::Net, false, true) => self.extra_nets.push(format!("Extra net in layout: {}", layout)),
            (Kind::Net, true, false) => {
                self.missing_nets.push(format!("Missing net from schematic: {}", schematic))
            }
            (Kind::Net, _, _) => self.nets.push(pair),
            (Kind::Device, false, true) => {
                self.extra_devices.push(format!("Extra device in layout: {}", layout))
            }
            (Kind::Device, true, false) => self
                .missing_devices
                .push(format!("Missing device from schematic: {}", schematic)),
            (Kind::Device, _, _) => self.devices.push(pair),
        }
    }

    fn into_vec(self) -> Vec<String> {
        let mut out = self.nets;
        out.extend(self.devices);
        out.extend(self.pins);
        out.extend(self.extra_nets);
        out.extend(self.missing_nets);
        out.extend(self.extra_devices);
        out.extend(self.missing_devices);
        out
    }
}

fn is_sentinel(id: &str) -> bool {
    id.bytes().all(|b| b == b'0')
}

pub fn parse_comparison_report(path: &Path) -> Result<Option<ComparisonReport>, ReportError> {
    let Some(bytes) = read_report(path)? else {
        tracing::debug!("No cross-reference database at {}", path.display());
        return Ok(None);
    };

    let content = String::from_utf8_lossy(&bytes);
    let report = parse_comparison_text(&content)?;
    tracing::debug!(
        "Parsed {}: match={} with {} issue(s)",
        path.display(),
        report.is_match(),
        report.mismatches().len()
    );
    Ok(Some(report))
}

pub fn parse_comparison_text(content: &str) -> Result<ComparisonReport, ReportError> {
    if !content.starts_with(SIGNATURE) {
        tracing::debug!("Report lacks the database signature, using text fallback");
        return Ok(if SUCCESS_PHRASES.iter().any(|p| content.contains(p)) {
            ComparisonReport::matched()
        } else {
            ComparisonReport::mismatched(vec![GENERIC_FAILURE.to_string()])
        });
    }

    let Some(section) = cross_reference_section(content) else {
        return Ok(ComparisonReport::mismatched(vec![NO_SECTION.to_string()]));
    };

    if !section.contains(MISMATCH_FLAG) {
        let odd = RECORD
            .captures_iter(section)
            .find(|caps| !matches!(&caps[4], "0" | "1"));
        if let Some(caps) = odd {
            return Err(ReportError::Anomaly {
                record: caps[0].to_string(),
                flag: caps[4].to_string(),
            });
        }
        return Ok(ComparisonReport::matched());
    }

    let mut mismatches = Mismatches::default();
    for caps in RECORD.captures_iter(section) {
        match &caps[4] {
            "1" => continue,
            "0" => {
                let Some(kind) = Kind::from_tag(&caps[1]) else {
                    return Err(ReportError::Malformed {
                        message: format!("unknown record kind in `{}`", &caps[0]),
                    });
                };
                mismatches.push(kind, &caps[2], &caps[3]);
            }
            flag => {
                return Err(ReportError::Anomaly {
                    record: caps[0].to_string(),
                    flag: flag.to_string(),
                })
            }
        }
    }

    let mismatches = mismatches.into_vec();
    if mismatches.is_empty() {
        return Ok(ComparisonReport::mismatched(vec![
            UNCLASSIFIED_MISMATCH.to_string()
        ]));
    }
    Ok(ComparisonReport::mismatched(mismatches))
}

/// Body of the first `Z(` section, up to its balancing `)`. A truncated
/// database is read up to and including its last closing parenthesis.
fn cross_reference_section(content: &str) -> Option<&str> {
    let start = content
        .match_indices(SECTION_MARKER)
        .map(|(index, _)| index)
        .find(|&index| {
            content[..index]
                .chars()
                .next_back()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
        })?
        + SECTION_MARKER.len();

    let mut depth = 1usize;
    for (offset, ch) in content[start..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset]);
                }
            }
            _ => {}
        }
    }

    let end = content.rfind(')')?;
    (end >= start).then(|| &content[start..=end])
}
