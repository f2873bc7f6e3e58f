//! Sink rule catalog.

use crate::config::AnalysisConfig;
use crate::models::{Confidence, Severity, VulnClass};

/// How a rule decides whether a call (or statement) is a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// `${...}` inside a mapping statement
    MapperSubstitution,
    /// Process spawning, confirmed through call target resolution
    ProcessSpawn,
    /// JSON binding entry class named by the receiver or a static import
    JsonBinding,
    /// Receiver variable typed as a script engine earlier in the method
    ScriptEngine,
    /// JDBC execution fed with a concatenated string
    JdbcConcat,
}

/// A sink signature.
#[derive(Debug, Clone)]
pub struct SinkRule {
    /// Unique identifier for this rule
    pub id: &'static str,

    /// Human-readable name
    pub name: &'static str,

    pub class: VulnClass,

    /// Method names the rule applies to; empty for mapping statements
    pub callees: &'static [&'static str],

    /// Qualified receiver types
    pub receivers: &'static [&'static str],

    /// Receiver text required by the name-only fallback, lowercase
    pub fallback_hint: Option<&'static str>,

    pub predicate: Predicate,

    pub severity: Severity,

    /// Confidence when the predicate matches outright
    pub confidence: Confidence,

    pub description: &'static str,

    pub remediation: &'static str,
}

impl SinkRule {
    pub fn applies_to(&self, callee: &str) -> bool {
        self.callees.contains(&callee)
    }

    pub fn cwe(&self) -> &'static str {
        self.class.cwe()
    }
}

/// Built-in rules, one row per sink signature.
pub fn builtin_rules() -> Vec<SinkRule> {
    vec![
        SinkRule {
            id: "SQL_MAPPER_SUBSTITUTION",
            name: "Raw substitution in mapping statement",
            class: VulnClass::SqlInjection,
            callees: &[],
            receivers: &[],
            fallback_hint: None,
            predicate: Predicate::MapperSubstitution,
            severity: Severity::High,
            confidence: Confidence::High,
            description: "Mapping statement interpolates a parameter with ${...} instead of binding it",
            remediation: "Use #{...} parameter binding, or whitelist the value before substitution.",
        },
        SinkRule {
            id: "SQL_JDBC_CONCAT",
            name: "Concatenated SQL passed to JDBC",
            class: VulnClass::SqlInjection,
            callees: &[
                "execute",
                "executeQuery",
                "executeUpdate",
                "executeBatch",
                "addBatch",
                "prepareStatement",
                "query",
                "queryForList",
                "queryForMap",
                "queryForObject",
                "update",
            ],
            receivers: &[],
            fallback_hint: None,
            predicate: Predicate::JdbcConcat,
            severity: Severity::High,
            confidence: Confidence::Medium,
            description: "SQL text built by string concatenation reaches a JDBC execution method",
            remediation: "Use a PreparedStatement with placeholders.",
        },
        SinkRule {
            id: "COMMAND_EXEC_RUNTIME",
            name: "Runtime.exec",
            class: VulnClass::CommandExec,
            callees: &["exec"],
            receivers: &["java.lang.Runtime"],
            fallback_hint: None,
            predicate: Predicate::ProcessSpawn,
            severity: Severity::Critical,
            confidence: Confidence::High,
            description: "Spawns an operating system process",
            remediation: "Avoid shelling out; if unavoidable pass a fixed argument vector.",
        },
        SinkRule {
            id: "COMMAND_EXEC_PROCESS_BUILDER",
            name: "ProcessBuilder.start",
            class: VulnClass::CommandExec,
            callees: &["start"],
            receivers: &["java.lang.ProcessBuilder"],
            fallback_hint: Some("processbuilder"),
            predicate: Predicate::ProcessSpawn,
            severity: Severity::Critical,
            confidence: Confidence::High,
            description: "Spawns an operating system process",
            remediation: "Avoid shelling out; if unavoidable pass a fixed argument vector.",
        },
        SinkRule {
            id: "DESERIALIZATION_FASTJSON",
            name: "fastjson parse",
            class: VulnClass::Deserialization,
            callees: &["parseObject", "parse", "parseArray"],
            receivers: &[
                "com.alibaba.fastjson.JSON",
                "com.alibaba.fastjson.JSONObject",
                "com.alibaba.fastjson.JSONArray",
            ],
            fallback_hint: None,
            predicate: Predicate::JsonBinding,
            severity: Severity::High,
            confidence: Confidence::Medium,
            description: "fastjson parsing with autoType can instantiate attacker-chosen classes",
            remediation: "Upgrade fastjson and enable safeMode, or parse into a fixed target type.",
        },
        SinkRule {
            id: "SCRIPT_EXEC_GROOVY_SHELL",
            name: "GroovyShell evaluation",
            class: VulnClass::ScriptExec,
            callees: &["parse", "evaluate", "run"],
            receivers: &["groovy.lang.GroovyShell"],
            fallback_hint: None,
            predicate: Predicate::ScriptEngine,
            severity: Severity::Critical,
            confidence: Confidence::High,
            description: "Evaluates Groovy source at runtime",
            remediation: "Do not evaluate request data; use a sandboxed CompilerConfiguration.",
        },
        SinkRule {
            id: "SCRIPT_EXEC_SCRIPT_ENGINE",
            name: "ScriptEngine.eval",
            class: VulnClass::ScriptExec,
            callees: &["eval"],
            receivers: &["javax.script.ScriptEngine"],
            fallback_hint: None,
            predicate: Predicate::ScriptEngine,
            severity: Severity::Critical,
            confidence: Confidence::High,
            description: "Evaluates script source through JSR-223",
            remediation: "Do not evaluate request data.",
        },
        SinkRule {
            id: "SCRIPT_EXEC_GROOVY_CLASS_LOADER",
            name: "GroovyClassLoader.parseClass",
            class: VulnClass::ScriptExec,
            callees: &["parseClass"],
            receivers: &["groovy.lang.GroovyClassLoader"],
            fallback_hint: None,
            predicate: Predicate::ScriptEngine,
            severity: Severity::Critical,
            confidence: Confidence::High,
            description: "Compiles Groovy source into a class at runtime",
            remediation: "Do not compile request data.",
        },
    ]
}

/// The set of rules enabled for one run.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<SinkRule>,
}

impl RuleCatalog {
    /// Every built-in rule.
    pub fn builtin() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }

    /// Built-in rules filtered by enabled families and disabled ids.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            rules: builtin_rules()
                .into_iter()
                .filter(|r| config.family_enabled(r.class) && config.rule_enabled(r.id))
                .collect(),
        }
    }

    pub fn rules(&self) -> &[SinkRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SinkRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Rules evaluated on call expressions with this callee name.
    pub fn code_rules_for<'a>(&'a self, callee: &'a str) -> impl Iterator<Item = &'a SinkRule> + 'a {
        self.rules
            .iter()
            .filter(move |r| r.predicate != Predicate::MapperSubstitution && r.applies_to(callee))
    }

    pub fn mapper_rule(&self) -> Option<&SinkRule> {
        self.rules
            .iter()
            .find(|r| r.predicate == Predicate::MapperSubstitution)
    }

    pub fn has_code_rules(&self) -> bool {
        self.rules
            .iter()
            .any(|r| r.predicate != Predicate::MapperSubstitution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_ids_unique() {
        let rules = builtin_rules();
        let mut ids: Vec<_> = rules.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), rules.len());
    }

    #[test]
    fn test_catalog_filtering() {
        let config = crate::config::Config::builder()
            .families(vec![VulnClass::ScriptExec, VulnClass::SqlInjection])
            .disable_rule("SQL_JDBC_CONCAT")
            .build();
        let catalog = RuleCatalog::from_config(&config.analysis);

        assert!(catalog.get("COMMAND_EXEC_RUNTIME").is_none());
        assert!(catalog.get("SQL_JDBC_CONCAT").is_none());
        assert!(catalog.mapper_rule().is_some());
        assert_eq!(catalog.code_rules_for("evaluate").count(), 1);
        assert_eq!(catalog.code_rules_for("exec").count(), 0);

        let sql_only = RuleCatalog::from_config(
            &crate::config::Config::builder()
                .families(vec![VulnClass::SqlInjection])
                .disable_rule("sql_jdbc_concat")
                .build()
                .analysis,
        );
        assert!(!sql_only.has_code_rules());
    }

    #[test]
    fn test_shared_callee_across_rules() {
        let catalog = RuleCatalog::builtin();
        let ids: Vec<_> = catalog.code_rules_for("parse").map(|r| r.id).collect();
        assert_eq!(ids, vec!["DESERIALIZATION_FASTJSON", "SCRIPT_EXEC_GROOVY_SHELL"]);
    }
}
