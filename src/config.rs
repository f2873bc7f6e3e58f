//! Configuration management for the chain auditor.

use crate::models::VulnClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Main configuration for the chain auditor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Analysis configuration
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Concurrency settings
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

/// Analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Rule families to run
    #[serde(default = "default_families")]
    pub families: Vec<VulnClass>,

    /// Annotations that mark a class as a web entry point
    #[serde(default = "default_entry_point_annotations")]
    pub entry_point_annotations: BTreeSet<String>,

    /// Resolve receiver types before falling back to name matching
    #[serde(default = "default_true")]
    pub resolve_symbols: bool,

    /// Rule ids to skip
    #[serde(default)]
    pub disabled_rules: Vec<String>,

    /// File patterns to ignore
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Maximum file size to analyze (in bytes)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Stop the implementation search beyond this depth
    #[serde(default)]
    pub max_chain_depth: Option<usize>,

    /// Wall-clock budget for one run
    #[serde(default)]
    pub budget_secs: Option<u64>,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Output file path (stdout if not specified)
    pub output_path: Option<PathBuf>,

    /// Colorize terminal output
    #[serde(default = "default_true")]
    pub colors: bool,

    /// Maximum rows rendered by the text reporter (0 = all)
    #[serde(default)]
    pub max_rows: usize,

    /// Include the evidence line of each row in text output
    #[serde(default = "default_true")]
    pub show_evidence: bool,

    /// Emit call chains as SARIF code flows
    #[serde(default = "default_true")]
    pub code_flows: bool,

    /// Page title of the HTML report
    #[serde(default)]
    pub html_title: Option<String>,
}

/// Concurrency configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Number of rayon threads for parsing and analysis (0 = auto)
    #[serde(default)]
    pub worker_threads: usize,

    /// Maximum files to parse in a single parallel batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Output format enumeration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// SARIF (Static Analysis Results Interchange Format)
    Sarif,
    /// Standalone HTML page
    Html,
}

fn default_true() -> bool {
    true
}

fn default_families() -> Vec<VulnClass> {
    VulnClass::ALL.to_vec()
}

/// Default entry-point annotation set.
pub fn default_entry_point_annotations() -> BTreeSet<String> {
    [
        "Controller",
        "RestController",
        "RequestMapping",
        "GetMapping",
        "PostMapping",
        "PutMapping",
        "DeleteMapping",
        "PatchMapping",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        "**/target/**".to_string(),
        "**/build/**".to_string(),
        "**/.git/**".to_string(),
        "**/node_modules/**".to_string(),
        "**/.idea/**".to_string(),
    ]
}

fn default_max_file_size() -> usize {
    2 * 1024 * 1024 // 2 MB
}

fn default_batch_size() -> usize {
    256
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            families: default_families(),
            entry_point_annotations: default_entry_point_annotations(),
            resolve_symbols: true,
            disabled_rules: Vec::new(),
            ignore_patterns: default_ignore_patterns(),
            max_file_size: default_max_file_size(),
            max_chain_depth: None,
            budget_secs: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            output_path: None,
            colors: true,
            max_rows: 0,
            show_evidence: true,
            code_flows: true,
            html_title: None,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            batch_size: default_batch_size(),
        }
    }
}

impl AnalysisConfig {
    pub fn family_enabled(&self, family: VulnClass) -> bool {
        self.families.contains(&family)
    }

    pub fn rule_enabled(&self, rule_id: &str) -> bool {
        !self.disabled_rules.iter().any(|r| r.eq_ignore_ascii_case(rule_id))
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scanner cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.analysis.families.is_empty() {
            return Err(crate::error::AuditorError::Config(
                "at least one rule family must be enabled".to_string(),
            ));
        }
        if self.concurrency.batch_size == 0 {
            return Err(crate::error::AuditorError::Config(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for creating configurations programmatically.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn families(mut self, families: Vec<VulnClass>) -> Self {
        self.config.analysis.families = families;
        self
    }

    pub fn entry_point_annotations<I, S>(mut self, annotations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.analysis.entry_point_annotations =
            annotations.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_entry_point_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.config
            .analysis
            .entry_point_annotations
            .insert(annotation.into());
        self
    }

    pub fn resolve_symbols(mut self, enable: bool) -> Self {
        self.config.analysis.resolve_symbols = enable;
        self
    }

    pub fn disable_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.config.analysis.disabled_rules.push(rule_id.into());
        self
    }

    pub fn max_chain_depth(mut self, depth: usize) -> Self {
        self.config.analysis.max_chain_depth = Some(depth);
        self
    }

    pub fn budget_secs(mut self, secs: u64) -> Self {
        self.config.analysis.budget_secs = Some(secs);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output.format = format;
        self
    }

    pub fn output_path(mut self, path: PathBuf) -> Self {
        self.config.output.output_path = Some(path);
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.concurrency.worker_threads = threads;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [analysis]
            families = ["SQL_INJECTION"]
            max_chain_depth = 4

            [output]
            format = "sarif"
            "#,
        )
        .unwrap();

        assert_eq!(config.analysis.families, vec![VulnClass::SqlInjection]);
        assert_eq!(config.analysis.max_chain_depth, Some(4));
        assert!(config.analysis.entry_point_annotations.contains("RestController"));
        assert_eq!(config.output.format, OutputFormat::Sarif);
        assert_eq!(config.concurrency.batch_size, 256);
    }

    #[test]
    fn test_builder_and_validation() {
        let config = Config::builder()
            .add_entry_point_annotation("Endpoint")
            .disable_rule("sql_concat")
            .build();
        assert!(config.analysis.entry_point_annotations.contains("Endpoint"));
        assert!(!config.analysis.rule_enabled("SQL_CONCAT"));
        assert!(config.validate().is_ok());

        let empty = Config::builder().families(vec![]).build();
        assert!(empty.validate().is_err());
    }
}
