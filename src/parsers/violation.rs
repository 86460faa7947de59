//! Rule-violation report databases (`.lyrdb`).
//!
//! The document carries a `categories` catalogue (`name`, `description`) and
//! an `items` list where every item names the category it belongs to. Items
//! quote that reference (`'m1.S'`), the catalogue does not.

use super::{read_report, ReportError};
use crate::domain::model::ViolationReport;
use indexmap::IndexMap;
use roxmltree::{Document, Node};
use std::collections::HashMap;
use std::path::Path;

/// Label for items that do not name a category.
pub const UNKNOWN_CATEGORY: &str = "unknown";

pub fn parse_violation_report(path: &Path) -> Result<Option<ViolationReport>, ReportError> {
    let Some(bytes) = read_report(path)? else {
        tracing::debug!("No violation report at {}", path.display());
        return Ok(None);
    };

    let xml = String::from_utf8_lossy(&bytes);
    let report = parse_violation_xml(&xml)?;
    tracing::debug!(
        "Parsed {}: {} violation(s) over {} rule(s)",
        path.display(),
        report.total(),
        report.by_rule().len()
    );
    Ok(Some(report))
}

pub fn parse_violation_xml(xml: &str) -> Result<ViolationReport, ReportError> {
    let doc = Document::parse(xml).map_err(|e| ReportError::Malformed {
        message: format!("invalid report database XML: {}", e),
    })?;

    let descriptions = category_catalogue(&doc);

    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for item in doc.descendants().filter(|n| is_entry(n, "item", "items")) {
        let category = child_text(item, "category")
            .map(strip_quotes)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        *counts.entry(category).or_insert(0) += 1;
    }

    Ok(counts
        .into_iter()
        .map(|(id, count)| {
            let label = match descriptions.get(&id) {
                Some(description) => format!("{}: {}", id, description),
                None => id,
            };
            (label, count)
        })
        .collect())
}

/// Maps category identifiers to their descriptions. Sub-categories are
/// registered under their bare name and their dotted path.
fn category_catalogue(doc: &Document) -> HashMap<String, String> {
    let mut descriptions = HashMap::new();

    for category in doc
        .descendants()
        .filter(|n| is_entry(n, "category", "categories"))
    {
        let Some(name) = child_text(category, "name").map(strip_quotes) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let Some(description) = child_text(category, "description")
            .map(str::trim)
            .filter(|d| !d.is_empty())
        else {
            continue;
        };

        let mut path: Vec<String> = category
            .ancestors()
            .skip(1)
            .filter(|n| is_entry(n, "category", "categories"))
            .filter_map(|n| child_text(n, "name").map(strip_quotes))
            .collect();
        if !path.is_empty() {
            path.reverse();
            path.push(name.clone());
            descriptions.insert(path.join("."), description.to_string());
        }
        descriptions.insert(name, description.to_string());
    }

    descriptions
}

fn is_entry(node: &Node, tag: &str, parent_tag: &str) -> bool {
    node.has_tag_name(tag)
        && node
            .parent_element()
            .is_some_and(|parent| parent.has_tag_name(parent_tag))
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
}

fn strip_quotes(raw: &str) -> String {
    raw.replace("\\'", "").replace('\'', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAND2_REPORT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<report-database>
 <description>DRC Run Report at cell.lydrc</description>
 <generator>drc: script='cell.lydrc'</generator>
 <top-cell>NAND2_X1</top-cell>
 <categories>
  <category>
   <name>m1.S</name>
   <description>Metal1 spacing &lt; 0.14um</description>
   <categories/>
  </category>
  <category>
   <name>m1.W</name>
   <description/>
   <categories/>
  </category>
 </categories>
 <cells>
  <cell><name>NAND2_X1</name><variant/></cell>
 </cells>
 <items>
  <item><category>'m1.S'</category><cell>NAND2_X1</cell><values><value>edge-pair: (0,0;1,0)|(0,1;1,1)</value></values></item>
  <item><category>'m1.W'</category><cell>NAND2_X1</cell></item>
  <item><category>'m1.S'</category><cell>NAND2_X1</cell></item>
  <item><cell>NAND2_X1</cell></item>
 </items>
</report-database>
"#;

    #[test]
    fn test_counts_by_rule_with_descriptions() {
        let report = parse_violation_xml(NAND2_REPORT).unwrap();

        assert_eq!(report.total(), 4);
        let rules: Vec<(&str, usize)> = report
            .by_rule()
            .iter()
            .map(|(label, count)| (label.as_str(), *count))
            .collect();
        assert_eq!(
            rules,
            vec![
                ("m1.S: Metal1 spacing < 0.14um", 2),
                ("m1.W", 1),
                (UNKNOWN_CATEGORY, 1),
            ]
        );
    }

    #[test]
    fn test_empty_item_list_is_clean() {
        let xml = r#"<report-database>
 <categories><category><name>m1.S</name><description>spacing</description></category></categories>
 <items/>
</report-database>"#;
        let report = parse_violation_xml(xml).unwrap();
        assert_eq!(report.total(), 0);
        assert!(report.by_rule().is_empty());
    }

    #[test]
    fn test_escaped_quotes_and_blank_category() {
        let xml = r#"<report-database>
 <categories><category><name>poly.X</name><description>poly extension</description></category></categories>
 <items>
  <item><category>\'poly.X\'</category></item>
  <item><category>''</category></item>
 </items>
</report-database>"#;
        let report = parse_violation_xml(xml).unwrap();
        assert_eq!(report.by_rule().get("poly.X: poly extension"), Some(&1));
        assert_eq!(report.by_rule().get(UNKNOWN_CATEGORY), Some(&1));
    }

    #[test]
    fn test_nested_category_paths() {
        let xml = r#"<report-database>
 <categories>
  <category>
   <name>metal</name>
   <categories>
    <category><name>m2.S</name><description>Metal2 spacing</description></category>
   </categories>
  </category>
 </categories>
 <items>
  <item><category>'metal'.'m2.S'</category></item>
 </items>
</report-database>"#;
        let report = parse_violation_xml(xml).unwrap();
        assert_eq!(report.by_rule().get("metal.m2.S: Metal2 spacing"), Some(&1));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let err = parse_violation_xml("<report-database><items>").unwrap_err();
        assert!(matches!(err, ReportError::Malformed { .. }));
    }

    #[test]
    fn test_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INV_X1_drc.lyrdb");
        assert!(parse_violation_report(&path).unwrap().is_none());

        std::fs::write(&path, NAND2_REPORT).unwrap();
        let report = parse_violation_report(&path).unwrap().unwrap();
        assert_eq!(report.total(), 4);
    }
}
