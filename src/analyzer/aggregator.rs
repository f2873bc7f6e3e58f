//! Flattens traced findings into deduplicated, ordered report rows.

use crate::models::{CallChainSegment, ReportRow, SinkFinding};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::debug;

/// Content fingerprint of a rendered row.
pub fn fingerprint(row: &ReportRow) -> String {
    let mut hasher = Sha256::new();
    hasher.update(row.vuln_class.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(row.origin.describe().as_bytes());
    hasher.update([0]);
    hasher.update(row.chain_text().as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

fn row(finding: &SinkFinding, segments: &[&CallChainSegment]) -> ReportRow {
    let mut row = ReportRow {
        vuln_class: finding.vuln_class(),
        rule_id: finding.rule_id.clone(),
        severity: finding.severity,
        confidence: finding.confidence,
        origin: finding.origin().clone(),
        evidence: finding.evidence.clone(),
        chain: segments.iter().map(|s| s.text.clone()).collect(),
        fingerprint: String::new(),
    };
    row.fingerprint = fingerprint(&row);
    row
}

/// Rows for one finding.
///
/// No chains gives one row, a single chain gives one row per segment, and both
/// chains give the implementation by controller cross product.
pub fn expand(finding: &SinkFinding) -> Vec<ReportRow> {
    let implementation = finding.implementation_chain();
    let controllers = finding.controller_chain();

    match (implementation.is_empty(), controllers.is_empty()) {
        (true, true) => vec![row(finding, &[])],
        (false, true) => implementation.iter().map(|s| row(finding, &[s])).collect(),
        (true, false) => controllers.iter().map(|c| row(finding, &[c])).collect(),
        (false, false) => implementation
            .iter()
            .flat_map(|s| controllers.iter().map(move |c| row(finding, &[s, c])))
            .collect(),
    }
}

/// Expand, deduplicate by fingerprint and sort by (class, file, line, chain).
pub fn aggregate(findings: &[SinkFinding]) -> Vec<ReportRow> {
    let mut seen = HashSet::new();
    let mut rows: Vec<ReportRow> = findings
        .iter()
        .flat_map(expand)
        .filter(|row| seen.insert(row.fingerprint.clone()))
        .collect();

    rows.sort_by(|a, b| {
        a.origin
            .class_name()
            .cmp(b.origin.class_name())
            .then_with(|| a.file().cmp(b.file()))
            .then_with(|| a.line().cmp(&b.line()))
            .then_with(|| a.chain_text().cmp(&b.chain_text()))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });

    debug!("{} findings -> {} rows", findings.len(), rows.len());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Origin, VulnClass};

    fn seg(caller: &str, text: &str) -> CallChainSegment {
        CallChainSegment {
            caller_class: caller.into(),
            caller_method: "m".into(),
            callee: "Task.run".into(),
            file: format!("{}.java", caller).into(),
            line: 1,
            depth: 1,
            text: text.into(),
        }
    }

    fn finding(class: &str, line: usize) -> SinkFinding {
        SinkFinding::new(
            VulnClass::CommandExec,
            Origin::Code {
                class: class.into(),
                method: "run".into(),
                file: format!("{}.java", class).into(),
                line,
            },
            "COMMAND_EXEC_RUNTIME",
            "exec(c);",
        )
    }

    #[test]
    fn test_row_shapes() {
        let bare = finding("A", 1);
        assert_eq!(expand(&bare).len(), 1);
        assert!(expand(&bare)[0].chain.is_empty());

        let mut both = finding("A", 1);
        both.push_implementation(seg("S1", "s1"));
        both.push_implementation(seg("S2", "s2"));
        both.push_controller(seg("C1", "c1"));
        both.push_controller(seg("C2", "c2"));
        let rows = expand(&both);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].chain, vec!["s1", "c1"]);
        assert_eq!(rows[0].chain_text(), "s1 <- c1");

        let mut controllers_only = finding("A", 1);
        controllers_only.push_controller(seg("C1", "c1"));
        controllers_only.push_controller(seg("C2", "c2"));
        assert_eq!(expand(&controllers_only).len(), 2);
    }

    #[test]
    fn test_dedup_and_order() {
        let mut a = finding("B", 9);
        a.push_implementation(seg("S", "s"));
        let duplicate = a.clone();
        let first = finding("A", 20);
        let second = finding("A", 3);

        let rows = aggregate(&[a, duplicate, first, second]);

        let keys: Vec<_> = rows
            .iter()
            .map(|r| (r.origin.class_name().to_string(), r.line()))
            .collect();
        assert_eq!(
            keys,
            vec![("A".to_string(), 3), ("A".to_string(), 20), ("B".to_string(), 9)]
        );
        assert_eq!(rows[0].fingerprint.len(), 16);
        assert_ne!(rows[0].fingerprint, rows[1].fingerprint);
    }
}
