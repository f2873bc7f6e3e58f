//! Rendering of scan results.

mod html;
mod sarif;
mod text;

pub use html::*;
pub use sarif::*;
pub use text::*;

use crate::config::{OutputConfig, OutputFormat};
use crate::models::ScanResult;

/// Report generator trait.
pub trait Reporter {
    /// Generate a report from scan results.
    fn generate(&self, result: &ScanResult) -> String;
}

/// Create a reporter for the configured format.
pub fn create_reporter(output: &OutputConfig) -> Box<dyn Reporter> {
    match output.format {
        OutputFormat::Sarif => Box::new(SarifReporter::new().with_code_flows(output.code_flows)),
        OutputFormat::Json => Box::new(JsonReporter::new()),
        OutputFormat::Html => match output.html_title {
            Some(ref title) => Box::new(HtmlReporter::new().with_title(title.as_str())),
            None => Box::new(HtmlReporter::new()),
        },
        OutputFormat::Text => {
            let mut reporter = TextReporter::new().with_max_rows(output.max_rows);
            if !output.colors {
                reporter = reporter.without_colors();
            }
            if !output.show_evidence {
                reporter = reporter.without_evidence();
            }
            Box::new(reporter)
        }
    }
}

/// JSON reporter: the scan result as serialized.
pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for JsonReporter {
    fn generate(&self, result: &ScanResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{Confidence, Origin, ReportRow, ScanResult, Severity, VulnClass};

    /// One SQL row with a two-hop chain and one untraced command row.
    pub fn sample_result() -> ScanResult {
        let mut result = ScanResult::new("demo-app");
        result.rows = vec![
            ReportRow {
                vuln_class: VulnClass::SqlInjection,
                rule_id: "SQL_MAPPER_SUBSTITUTION".into(),
                severity: Severity::High,
                confidence: Confidence::High,
                origin: Origin::Mapper {
                    namespace: "com.app.dao.UserMapper".into(),
                    statement_id: "findUser".into(),
                    file: "src/main/resources/UserMapper.xml".into(),
                    line: 4,
                },
                evidence: "select * from users where name = '${name}'".into(),
                chain: vec![
                    "UserServiceImpl.getUser invokes UserMapper.findUser at UserServiceImpl.java:12: return userMapper.findUser(name);".into(),
                    "UserController.show invokes UserServiceImpl.getUser at UserController.java:20: return service.getUser(name);".into(),
                ],
                fingerprint: "0011223344556677".into(),
            },
            ReportRow {
                vuln_class: VulnClass::CommandExec,
                rule_id: "COMMAND_EXEC_RUNTIME".into(),
                severity: Severity::Critical,
                confidence: Confidence::Low,
                origin: Origin::Code {
                    class: "Task".into(),
                    method: "run".into(),
                    file: "src/main/java/com/app/Task.java".into(),
                    line: 9,
                },
                evidence: "Runtime.getRuntime().exec(cmd);".into(),
                chain: Vec::new(),
                fingerprint: "8899aabbccddeeff".into(),
            },
        ];
        result.stats.java_files = 4;
        result.stats.mapping_documents = 1;
        result.stats.rows = 2;
        result
    }
}
