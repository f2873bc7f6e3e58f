//! Standalone HTML reporter: one section per vulnerability class, one
//! collapsible entry per row.

use super::Reporter;
use crate::models::{ReportRow, ScanResult, VulnClass};
use sha2::{Digest, Sha256};

const STYLE: &str = "body { font-family: Arial, sans-serif; margin: 40px; }
h1 { text-align: center; color: #333; }
details { margin-bottom: 12px; border: 1px solid #ddd; border-radius: 4px; }
summary { font-weight: bold; cursor: pointer; padding: 10px; background: #eee; }
.content { padding: 10px; }
.content pre { margin: 0; white-space: pre-wrap; }
.critical { color: #b00; } .high { color: #d40; } .medium { color: #a70; } .low { color: #078; }";

/// HTML format reporter.
pub struct HtmlReporter {
    title: String,
}

impl HtmlReporter {
    pub fn new() -> Self {
        Self {
            title: "Chain Audit Report".to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Hash over every row fingerprint; embedded in the page so an unchanged
    /// report can be recognized without re-rendering.
    pub fn content_fingerprint(result: &ScanResult) -> String {
        let mut hasher = Sha256::new();
        for row in &result.rows {
            hasher.update(row.fingerprint.as_bytes());
            hasher.update([b'\n']);
        }
        format!("{:x}", hasher.finalize())
    }

    fn render_row(&self, output: &mut String, row: &ReportRow, index: usize) {
        let severity = row.severity.to_string();
        output.push_str("<details>\n");
        output.push_str(&format!(
            "<summary><span class='{}'>[{}]</span> {} {}: {}</summary>\n",
            severity.to_lowercase(),
            severity,
            row.vuln_class.title(),
            index,
            escape(&row.origin.describe())
        ));
        output.push_str("<div class='content'>\n");
        output.push_str(&format!(
            "<p>Rule <code>{}</code>, {} confidence, fingerprint <code>{}</code></p>\n",
            escape(&row.rule_id),
            row.confidence,
            escape(&row.fingerprint)
        ));
        output.push_str(&format!("<pre>{}</pre>\n", escape(&row.evidence)));
        if row.chain.is_empty() {
            output.push_str("<p><em>No caller found.</em></p>\n");
        } else {
            output.push_str("<ol>\n");
            for hop in &row.chain {
                output.push_str(&format!("<li>{}</li>\n", escape(hop)));
            }
            output.push_str("</ol>\n");
        }
        output.push_str("</div>\n</details>\n");
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl Default for HtmlReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for HtmlReporter {
    fn generate(&self, result: &ScanResult) -> String {
        let mut output = String::new();

        output.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset='utf-8'>\n");
        output.push_str(&format!("<title>{}</title>\n", escape(&self.title)));
        output.push_str(&format!("<style>\n{}\n</style>\n</head>\n<body>\n", STYLE));
        output.push_str(&format!("<h1>{}</h1>\n", escape(&self.title)));
        output.push_str(&format!(
            "<p>Project <code>{}</code>, scanned {} ({} rows, {} diagnostics)</p>\n",
            escape(&result.project.display().to_string()),
            result.completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            result.rows.len(),
            result.diagnostics.len()
        ));

        for class in VulnClass::ALL {
            let rows: Vec<&ReportRow> = result.rows.iter().filter(|r| r.vuln_class == class).collect();
            if rows.is_empty() {
                continue;
            }
            output.push_str(&format!(
                "<h2>{} ({})</h2>\n",
                class.title(),
                class.cwe()
            ));
            for (i, row) in rows.iter().enumerate() {
                self.render_row(&mut output, row, i + 1);
            }
        }

        if result.rows.is_empty() {
            output.push_str("<p>No vulnerable sinks detected.</p>\n");
        }

        output.push_str("</body>\n</html>\n");
        output.push_str(&format!(
            "<!-- fingerprint: {} -->\n",
            Self::content_fingerprint(result)
        ));
        output
    }
}
