//! Human-readable text reporter.

use super::Reporter;
use crate::models::{Confidence, ReportRow, ScanResult, Severity, VulnClass};

/// Text format reporter for terminal output.
pub struct TextReporter {
    /// Use colors in output
    use_colors: bool,

    /// Show the evidence line
    show_evidence: bool,

    /// Maximum rows to show (0 = unlimited)
    max_rows: usize,
}

impl TextReporter {
    /// Create a new text reporter.
    pub fn new() -> Self {
        Self {
            use_colors: true,
            show_evidence: true,
            max_rows: 0,
        }
    }

    /// Disable colors.
    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    /// Disable evidence lines.
    pub fn without_evidence(mut self) -> Self {
        self.show_evidence = false;
        self
    }

    /// Limit number of rows shown.
    pub fn with_max_rows(mut self, max: usize) -> Self {
        self.max_rows = max;
        self
    }

    fn severity_color(&self, severity: Severity) -> &'static str {
        if !self.use_colors {
            return "";
        }
        match severity {
            Severity::Critical => "\x1b[91m", // Bright red
            Severity::High => "\x1b[31m",     // Red
            Severity::Medium => "\x1b[33m",   // Yellow
            Severity::Low => "\x1b[36m",      // Cyan
        }
    }

    fn reset(&self) -> &'static str {
        if self.use_colors {
            "\x1b[0m"
        } else {
            ""
        }
    }

    fn bold(&self) -> &'static str {
        if self.use_colors {
            "\x1b[1m"
        } else {
            ""
        }
    }

    fn dim(&self) -> &'static str {
        if self.use_colors {
            "\x1b[2m"
        } else {
            ""
        }
    }

    fn class_tag(&self, class: VulnClass) -> &'static str {
        match class {
            VulnClass::SqlInjection => "[SQLI]",
            VulnClass::CommandExec => "[RCE]",
            VulnClass::Deserialization => "[DESER]",
            VulnClass::ScriptExec => "[SCRIPT]",
        }
    }

    fn render_row(&self, output: &mut String, row: &ReportRow) {
        output.push_str(&format!(
            "{}[{}]{} {} {}{}{}\n",
            self.severity_color(row.severity),
            row.severity,
            self.reset(),
            self.class_tag(row.vuln_class),
            self.bold(),
            row.origin.describe(),
            self.reset()
        ));

        output.push_str(&format!(
            "  {}Rule:{} {} ({} confidence)\n",
            self.dim(),
            self.reset(),
            row.rule_id,
            row.confidence
        ));

        if self.show_evidence {
            output.push_str(&format!(
                "  {}Evidence:{} {}\n",
                self.dim(),
                self.reset(),
                row.evidence
            ));
        }

        if row.chain.is_empty() {
            output.push_str(&format!(
                "  {}Chain:{} no caller found\n",
                self.dim(),
                self.reset()
            ));
        } else {
            output.push_str(&format!("  {}Chain:{}\n", self.dim(), self.reset()));
            for (depth, hop) in row.chain.iter().enumerate() {
                output.push_str(&format!("    {}<- {}\n", "  ".repeat(depth), hop));
            }
        }

        if row.confidence == Confidence::Low {
            output.push_str(&format!(
                "  {}Note:{} matched without full type information\n",
                self.dim(),
                self.reset()
            ));
        }
    }
}

impl Default for TextReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for TextReporter {
    fn generate(&self, result: &ScanResult) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "\n{}=== Chain Audit Report ==={}\n\n",
            self.bold(),
            self.reset()
        ));

        output.push_str(&format!(
            "{}Project:{} {}\n",
            self.bold(),
            self.reset(),
            result.project.display()
        ));
        output.push_str(&format!(
            "{}Scan Time:{} {} - {}\n",
            self.bold(),
            self.reset(),
            result.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            result.completed_at.format("%H:%M:%S UTC")
        ));
        output.push_str(&format!(
            "{}Duration:{} {}ms\n\n",
            self.bold(),
            self.reset(),
            result.stats.duration_ms
        ));

        // Summary
        output.push_str(&format!("{}--- Summary ---{}\n", self.bold(), self.reset()));
        output.push_str(&format!("Java Files: {}\n", result.stats.java_files));
        output.push_str(&format!(
            "Mapping Documents: {}\n",
            result.stats.mapping_documents
        ));
        output.push_str(&format!(
            "Findings: {} ({} traced)\n",
            result.stats.raw_findings, result.stats.traced_findings
        ));
        output.push_str(&format!("Diagnostics: {}\n\n", result.diagnostics.len()));

        output.push_str(&format!("{}Rows:{}\n", self.bold(), self.reset()));
        for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
            output.push_str(&format!(
                "  {}{}:{} {}\n",
                self.severity_color(severity),
                severity,
                self.reset(),
                result.count_by_severity(severity)
            ));
        }
        output.push('\n');

        if result.rows.is_empty() {
            output.push_str(&format!(
                "{}No vulnerable sinks detected.{}\n",
                self.dim(),
                self.reset()
            ));
        } else {
            output.push_str(&format!("{}--- Rows ---{}\n\n", self.bold(), self.reset()));

            let shown = if self.max_rows > 0 {
                &result.rows[..self.max_rows.min(result.rows.len())]
            } else {
                &result.rows[..]
            };

            for (i, row) in shown.iter().enumerate() {
                self.render_row(&mut output, row);
                output.push('\n');

                if i + 1 < shown.len() {
                    output.push_str(&format!("{}---{}\n\n", self.dim(), self.reset()));
                }
            }

            if shown.len() < result.rows.len() {
                output.push_str(&format!(
                    "\n{}... and {} more rows{}\n",
                    self.dim(),
                    result.rows.len() - shown.len(),
                    self.reset()
                ));
            }
        }

        if !result.diagnostics.is_empty() {
            output.push_str(&format!(
                "\n{}--- Diagnostics ---{}\n",
                self.bold(),
                self.reset()
            ));
            for diagnostic in &result.diagnostics {
                let location = diagnostic
                    .path
                    .as_ref()
                    .map(|p| format!("{}: ", p.display()))
                    .unwrap_or_default();
                output.push_str(&format!(
                    "  {}{:?}{} {}{}\n",
                    self.dim(),
                    diagnostic.kind,
                    self.reset(),
                    location,
                    diagnostic.message
                ));
            }
        }

        output.push_str(&format!("\n{}--- Status ---{}\n", self.bold(), self.reset()));
        if result.success {
            output.push_str(&format!(
                "{}Scan completed successfully.{}\n",
                if self.use_colors { "\x1b[32m" } else { "" },
                self.reset()
            ));
        } else {
            output.push_str(&format!(
                "{}Scan failed: {}{}\n",
                if self.use_colors { "\x1b[31m" } else { "" },
                result.error.as_deref().unwrap_or("Unknown error"),
                self.reset()
            ));
        }

        if result.has_blocking_rows() {
            output.push_str(&format!(
                "\n{}WARNING: Critical or high severity sinks found. Review required.{}\n",
                if self.use_colors { "\x1b[31m" } else { "" },
                self.reset()
            ));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::fixtures::sample_result;

    #[test]
    fn test_text_report_generation() {
        let reporter = TextReporter::new().without_colors();
        let report = reporter.generate(&sample_result());

        assert!(report.contains("Chain Audit Report"));
        assert!(report.contains("demo-app"));
        assert!(report.contains("[HIGH] [SQLI] com.app.dao.UserMapper.findUser"));
        assert!(report.contains("<- UserServiceImpl.getUser"));
        assert!(report.contains("no caller found"));
        assert!(report.contains("WARNING"));
        assert!(!report.contains("\x1b["));
    }

    #[test]
    fn test_row_limit() {
        let report = TextReporter::new()
            .without_colors()
            .with_max_rows(1)
            .generate(&sample_result());
        assert!(report.contains("... and 1 more rows"));
    }

    #[test]
    fn test_empty_report() {
        let reporter = TextReporter::new().without_colors();
        let report = reporter.generate(&ScanResult::new("demo-app"));
        assert!(report.contains("No vulnerable sinks detected"));
    }
}
