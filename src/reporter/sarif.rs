//! SARIF (Static Analysis Results Interchange Format) reporter.

use super::Reporter;
use crate::analyzer::{builtin_rules, SinkRule};
use crate::models::{Confidence, Origin, ReportRow, ScanResult, Severity};
use serde_json::{json, Value};
use std::collections::HashSet;

/// SARIF 2.1.0 reporter.
pub struct SarifReporter {
    tool_name: String,

    tool_version: String,

    /// Attach the call chain as a SARIF code flow
    include_code_flows: bool,
}

impl SarifReporter {
    pub fn new() -> Self {
        Self {
            tool_name: "chain_auditor".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            include_code_flows: true,
        }
    }

    /// Set whether to include call chains as code flows.
    pub fn with_code_flows(mut self, include: bool) -> Self {
        self.include_code_flows = include;
        self
    }

    /// Build a SARIF rule descriptor from a row and its catalog entry.
    fn build_rule(&self, row: &ReportRow, rule: Option<&SinkRule>) -> Value {
        let name = rule.map(|r| r.name).unwrap_or(row.rule_id.as_str());
        let description = rule.map(|r| r.description).unwrap_or(row.vuln_class.title());

        let mut descriptor = json!({
            "id": row.rule_id,
            "name": name,
            "shortDescription": {
                "text": name
            },
            "fullDescription": {
                "text": description
            },
            "defaultConfiguration": {
                "level": severity_to_level(row.severity)
            },
            "properties": {
                "security-severity": severity_to_score(row.severity),
                "tags": ["security", row.vuln_class.as_str(), row.vuln_class.cwe()]
            }
        });

        if let Some(rule) = rule {
            descriptor["help"] = json!({
                "text": rule.remediation,
                "markdown": format!("**Remediation:** {}", rule.remediation)
            });
        }

        descriptor
    }

    fn build_result(&self, row: &ReportRow) -> Value {
        let message = match &row.origin {
            Origin::Mapper { .. } => format!(
                "{} in mapping statement {}",
                row.vuln_class.title(),
                row.origin.describe()
            ),
            Origin::Code { .. } => format!(
                "{} sink in {}",
                row.vuln_class.title(),
                row.origin.describe()
            ),
        };

        let mut result = json!({
            "ruleId": row.rule_id,
            "level": severity_to_level(row.severity),
            "message": {
                "text": message
            },
            "locations": [{
                "physicalLocation": {
                    "artifactLocation": {
                        "uri": artifact_uri(row),
                        "uriBaseId": "%SRCROOT%"
                    },
                    "region": {
                        "startLine": row.line(),
                        "snippet": {
                            "text": row.evidence
                        }
                    }
                }
            }],
            "fingerprints": {
                "primary": row.fingerprint
            },
            "properties": {
                "vulnerabilityClass": row.vuln_class,
                "precision": confidence_to_precision(row.confidence)
            }
        });

        if self.include_code_flows && !row.chain.is_empty() {
            let locations: Vec<Value> = row
                .chain
                .iter()
                .map(|hop| json!({ "location": { "message": { "text": hop } } }))
                .collect();
            result["codeFlows"] = json!([{
                "threadFlows": [{ "locations": locations }]
            }]);
        }

        result
    }
}

fn artifact_uri(row: &ReportRow) -> String {
    row.file().to_string_lossy().replace('\\', "/")
}

fn severity_to_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical | Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low => "note",
    }
}

fn severity_to_score(severity: Severity) -> f32 {
    match severity {
        Severity::Critical => 9.8,
        Severity::High => 8.0,
        Severity::Medium => 5.0,
        Severity::Low => 3.0,
    }
}

fn confidence_to_precision(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::High => "high",
        Confidence::Medium => "medium",
        Confidence::Low => "low",
    }
}

impl Default for SarifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for SarifReporter {
    fn generate(&self, result: &ScanResult) -> String {
        let catalog = builtin_rules();

        let mut rules: Vec<Value> = Vec::new();
        let mut seen_rules = HashSet::new();
        for row in &result.rows {
            if seen_rules.insert(row.rule_id.clone()) {
                let rule = catalog.iter().find(|r| r.id == row.rule_id);
                rules.push(self.build_rule(row, rule));
            }
        }

        let results: Vec<Value> = result.rows.iter().map(|r| self.build_result(r)).collect();

        let notifications: Vec<Value> = result
            .diagnostics
            .iter()
            .map(|d| {
                let locations: Vec<Value> = d
                    .path
                    .iter()
                    .map(|p| {
                        json!({
                            "physicalLocation": {
                                "artifactLocation": { "uri": p.to_string_lossy() }
                            }
                        })
                    })
                    .collect();
                json!({
                    "level": "warning",
                    "message": { "text": d.message },
                    "descriptor": { "id": d.kind },
                    "locations": locations
                })
            })
            .collect();

        let sarif = json!({
            "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json",
            "version": "2.1.0",
            "runs": [{
                "tool": {
                    "driver": {
                        "name": self.tool_name,
                        "version": self.tool_version,
                        "rules": rules
                    }
                },
                "results": results,
                "invocations": [{
                    "executionSuccessful": result.success,
                    "startTimeUtc": result.started_at.to_rfc3339(),
                    "endTimeUtc": result.completed_at.to_rfc3339(),
                    "toolExecutionNotifications": notifications
                }],
                "properties": {
                    "project": result.project,
                    "stats": {
                        "javaFiles": result.stats.java_files,
                        "mappingDocuments": result.stats.mapping_documents,
                        "rawFindings": result.stats.raw_findings,
                        "rows": result.stats.rows,
                        "durationMs": result.stats.duration_ms
                    }
                }
            }]
        });

        serde_json::to_string_pretty(&sarif).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Diagnostic, DiagnosticKind};
    use crate::reporter::fixtures::sample_result;

    #[test]
    fn test_sarif_generation() {
        let mut result = sample_result();
        result.diagnostics.push(Diagnostic::new(
            DiagnosticKind::ParseFailure,
            Some("Broken.java".into()),
            "syntax error near line 3",
        ));

        let sarif = SarifReporter::new().generate(&result);
        let parsed: Value = serde_json::from_str(&sarif).unwrap();

        assert_eq!(parsed["version"], "2.1.0");
        let run = &parsed["runs"][0];
        assert_eq!(run["results"].as_array().unwrap().len(), 2);
        assert_eq!(run["tool"]["driver"]["rules"].as_array().unwrap().len(), 2);
        assert_eq!(
            run["results"][0]["codeFlows"][0]["threadFlows"][0]["locations"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
        assert!(run["results"][1].get("codeFlows").is_none());
        assert_eq!(run["results"][1]["properties"]["precision"], "low");
        assert_eq!(
            run["invocations"][0]["toolExecutionNotifications"][0]["descriptor"]["id"],
            "parse_failure"
        );
    }
}
