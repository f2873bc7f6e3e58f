//! Finding, chain and report data models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Vulnerability classes detected by the auditor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VulnClass {
    SqlInjection,
    CommandExec,
    Deserialization,
    ScriptExec,
}

impl VulnClass {
    pub const ALL: [VulnClass; 4] = [
        VulnClass::SqlInjection,
        VulnClass::CommandExec,
        VulnClass::Deserialization,
        VulnClass::ScriptExec,
    ];

    /// Stable identifier used on the command line and in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            VulnClass::SqlInjection => "sql-injection",
            VulnClass::CommandExec => "command-exec",
            VulnClass::Deserialization => "deserialization",
            VulnClass::ScriptExec => "script-exec",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            VulnClass::SqlInjection => "SQL Injection",
            VulnClass::CommandExec => "OS Command Execution",
            VulnClass::Deserialization => "Unsafe Deserialization",
            VulnClass::ScriptExec => "Dynamic Script Evaluation",
        }
    }

    pub fn cwe(&self) -> &'static str {
        match self {
            VulnClass::SqlInjection => "CWE-89",
            VulnClass::CommandExec => "CWE-78",
            VulnClass::Deserialization => "CWE-502",
            VulnClass::ScriptExec => "CWE-94",
        }
    }
}

impl std::fmt::Display for VulnClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VulnClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "sql-injection" | "sql" | "sqli" => Ok(VulnClass::SqlInjection),
            "command-exec" | "rce" | "command" => Ok(VulnClass::CommandExec),
            "deserialization" | "deser" | "fastjson" => Ok(VulnClass::Deserialization),
            "script-exec" | "script" | "groovy" => Ok(VulnClass::ScriptExec),
            other => Err(format!("unknown rule family: {}", other)),
        }
    }
}

/// Severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Confidence level for findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

/// Where a finding was raised.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Origin {
    /// A statement inside a mapping document
    Mapper {
        namespace: String,
        statement_id: String,
        file: PathBuf,
        line: usize,
    },
    /// A call site inside Java code
    Code {
        class: String,
        method: String,
        file: PathBuf,
        line: usize,
    },
}

impl Origin {
    pub fn file(&self) -> &Path {
        match self {
            Origin::Mapper { file, .. } | Origin::Code { file, .. } => file,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            Origin::Mapper { line, .. } | Origin::Code { line, .. } => *line,
        }
    }

    /// Method name the tracer starts from.
    pub fn method(&self) -> &str {
        match self {
            Origin::Mapper { statement_id, .. } => statement_id,
            Origin::Code { method, .. } => method,
        }
    }

    /// Simple class name: the mapper interface or the enclosing class.
    pub fn class_name(&self) -> &str {
        match self {
            Origin::Mapper { namespace, .. } => {
                namespace.rsplit('.').next().unwrap_or(namespace)
            }
            Origin::Code { class, .. } => class,
        }
    }

    /// One-line human rendering.
    pub fn describe(&self) -> String {
        match self {
            Origin::Mapper {
                namespace,
                statement_id,
                file,
                line,
            } => format!(
                "{}.{} ({}:{})",
                if namespace.is_empty() { "<no namespace>" } else { namespace },
                statement_id,
                file.display(),
                line
            ),
            Origin::Code {
                class,
                method,
                file,
                line,
            } => format!("{}.{} ({}:{})", class, method, file.display(), line),
        }
    }
}

/// One link of a reconstructed call chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallChainSegment {
    pub caller_class: String,
    pub caller_method: String,
    /// What the caller invokes, e.g. `UserMapper.findUser`
    pub callee: String,
    pub file: PathBuf,
    pub line: usize,
    /// Breadth-first depth, starting at 1
    pub depth: usize,
    /// Rendered text
    pub text: String,
}

/// A detected sink occurrence.
///
/// Class and origin are fixed at construction. Chains only grow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkFinding {
    vuln_class: VulnClass,
    origin: Origin,

    /// Catalog rule that matched
    pub rule_id: String,

    /// Trimmed source text
    pub evidence: String,

    pub confidence: Confidence,
    pub severity: Severity,

    /// Whether the origin already sits in a web entry-point class
    #[serde(default)]
    pub origin_is_entry_point: bool,

    /// Additional metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,

    implementation_chain: Vec<CallChainSegment>,
    controller_chain: Vec<CallChainSegment>,
}

impl SinkFinding {
    pub fn new(
        vuln_class: VulnClass,
        origin: Origin,
        rule_id: impl Into<String>,
        evidence: impl Into<String>,
    ) -> Self {
        Self {
            vuln_class,
            origin,
            rule_id: rule_id.into(),
            evidence: evidence.into(),
            confidence: Confidence::Medium,
            severity: Severity::High,
            origin_is_entry_point: false,
            metadata: BTreeMap::new(),
            implementation_chain: Vec::new(),
            controller_chain: Vec::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn vuln_class(&self) -> VulnClass {
        self.vuln_class
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn implementation_chain(&self) -> &[CallChainSegment] {
        &self.implementation_chain
    }

    pub fn controller_chain(&self) -> &[CallChainSegment] {
        &self.controller_chain
    }

    pub fn push_implementation(&mut self, segment: CallChainSegment) {
        self.implementation_chain.push(segment);
    }

    pub fn push_controller(&mut self, segment: CallChainSegment) {
        self.controller_chain.push(segment);
    }

    pub fn is_traced(&self) -> bool {
        !self.implementation_chain.is_empty() || !self.controller_chain.is_empty()
    }
}

/// A flattened, deduplicated report row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub vuln_class: VulnClass,
    pub rule_id: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub origin: Origin,
    pub evidence: String,
    /// Rendered chain segments, implementation first
    pub chain: Vec<String>,
    /// SHA-256 over origin and chain text
    pub fingerprint: String,
}

impl ReportRow {
    pub fn file(&self) -> &Path {
        self.origin.file()
    }

    pub fn line(&self) -> usize {
        self.origin.line()
    }

    pub fn chain_text(&self) -> String {
        self.chain.join(" <- ")
    }
}

/// Non-fatal problems collected during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    ParseFailure,
    ResolutionFailure,
    BindingMiss,
    BudgetExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: Option<PathBuf>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
        }
    }
}

/// Counters reported alongside the rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    pub java_files: usize,
    pub mapping_documents: usize,
    pub types_indexed: usize,
    pub call_sites_indexed: usize,
    pub parse_failures: usize,
    pub raw_findings: usize,
    pub traced_findings: usize,
    pub rows: usize,
    pub duration_ms: u64,
}

/// Result of scanning a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Project root as given
    pub project: PathBuf,

    pub rows: Vec<ReportRow>,

    pub diagnostics: Vec<Diagnostic>,

    pub stats: ScanStats,

    pub started_at: chrono::DateTime<chrono::Utc>,

    pub completed_at: chrono::DateTime<chrono::Utc>,

    /// Whether the scan ran to completion
    pub success: bool,

    /// Error message if the scan failed
    pub error: Option<String>,
}

impl ScanResult {
    /// Empty result stamped with the current time.
    pub fn new(project: impl Into<PathBuf>) -> Self {
        let now = chrono::Utc::now();
        Self {
            project: project.into(),
            rows: Vec::new(),
            diagnostics: Vec::new(),
            stats: ScanStats::default(),
            started_at: now,
            completed_at: now,
            success: true,
            error: None,
        }
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.rows.iter().filter(|r| r.severity == severity).count()
    }

    pub fn has_blocking_rows(&self) -> bool {
        self.rows
            .iter()
            .any(|r| matches!(r.severity, Severity::Critical | Severity::High))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chains_are_additive() {
        let origin = Origin::Code {
            class: "Task".into(),
            method: "run".into(),
            file: "Task.java".into(),
            line: 7,
        };
        let mut finding = SinkFinding::new(VulnClass::CommandExec, origin.clone(), "COMMAND_EXEC", "x")
            .with_severity(Severity::Critical);
        assert!(!finding.is_traced());

        finding.push_controller(CallChainSegment {
            caller_class: "TaskController".into(),
            caller_method: "go".into(),
            callee: "Task.run".into(),
            file: "TaskController.java".into(),
            line: 3,
            depth: 1,
            text: "TaskController.go".into(),
        });

        assert!(finding.is_traced());
        assert_eq!(finding.origin(), &origin);
        assert_eq!(finding.controller_chain().len(), 1);
        assert_eq!(finding.severity, Severity::Critical);
    }

    #[test]
    fn test_origin_class_name() {
        let origin = Origin::Mapper {
            namespace: "com.app.mapper.UserMapper".into(),
            statement_id: "findUser".into(),
            file: "UserMapper.xml".into(),
            line: 4,
        };
        assert_eq!(origin.class_name(), "UserMapper");
        assert_eq!(origin.method(), "findUser");
    }

    #[test]
    fn test_family_parsing() {
        assert_eq!("sql".parse::<VulnClass>().unwrap(), VulnClass::SqlInjection);
        assert_eq!("SCRIPT_EXEC".parse::<VulnClass>().unwrap(), VulnClass::ScriptExec);
        assert!("xss".parse::<VulnClass>().is_err());
    }
}
