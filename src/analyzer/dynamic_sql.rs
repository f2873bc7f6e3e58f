//! Detects raw `${...}` substitution in mapping statements.

use crate::analyzer::rules::SinkRule;
use crate::error::{AuditorError, Result};
use crate::models::{MappingDocument, MappingStatement, Origin, SinkFinding};
use regex::Regex;
use tracing::debug;

/// Scanner for mapping documents.
pub struct DynamicSqlScanner {
    substitution: Regex,
}

impl DynamicSqlScanner {
    pub fn new() -> Result<Self> {
        // `${` opens a raw substitution; `#{` is a bound parameter
        let substitution = Regex::new(r"\$\{\s*([^}]*?)\s*\}")
            .map_err(|e| AuditorError::Config(format!("Invalid substitution pattern: {}", e)))?;
        Ok(Self { substitution })
    }

    /// Parameter names substituted raw into a statement, in order of appearance.
    pub fn substitutions(&self, text: &str) -> Vec<String> {
        self.substitution
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| {
                m.as_str()
                    .split(',')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string()
            })
            .collect()
    }

    /// Whether the statement text contains the unescaped substitution marker.
    pub fn is_flagged(statement: &MappingStatement) -> bool {
        statement.text.contains("${")
    }

    /// One finding per flagged statement, in document order.
    pub fn scan(&self, doc: &MappingDocument, rule: &SinkRule) -> Vec<SinkFinding> {
        doc.statements
            .iter()
            .filter(|stmt| Self::is_flagged(stmt))
            .map(|stmt| {
                debug!(
                    "Raw substitution in {}#{} at {}:{}",
                    stmt.namespace,
                    stmt.id,
                    doc.path.display(),
                    stmt.line
                );

                let origin = Origin::Mapper {
                    namespace: stmt.namespace.clone(),
                    statement_id: stmt.id.clone(),
                    file: doc.path.clone(),
                    line: stmt.line,
                };

                SinkFinding::new(rule.class, origin, rule.id, evidence(&stmt.text))
                    .with_severity(rule.severity)
                    .with_confidence(rule.confidence)
                    .with_metadata("statement_kind", serde_json::json!(stmt.kind.as_str()))
                    .with_metadata("substitutions", serde_json::json!(self.substitutions(&stmt.text)))
            })
            .collect()
    }
}

/// Statement text trimmed and collapsed onto one line.
fn evidence(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::rules::RuleCatalog;
    use crate::models::{StatementKind, VulnClass};

    fn statement(id: &str, text: &str, line: usize) -> MappingStatement {
        MappingStatement {
            namespace: "com.app.dao.UserMapper".into(),
            id: id.into(),
            kind: StatementKind::Select,
            text: text.into(),
            line,
        }
    }

    #[test]
    fn test_flags_only_raw_substitution() {
        let catalog = RuleCatalog::builtin();
        let rule = catalog.mapper_rule().unwrap();
        let doc = MappingDocument {
            path: "UserMapper.xml".into(),
            namespace: Some("com.app.dao.UserMapper".into()),
            has_mapper_root: true,
            statements: vec![
                statement("findUser", "\n  select * from users\n  where name = '${name}'\n", 4),
                statement("findById", "select * from users where id = #{id}", 9),
                statement("orderBy", "select * from t order by ${ column , jdbcType=VARCHAR } ${dir}", 12),
            ],
        };

        let findings = DynamicSqlScanner::new().unwrap().scan(&doc, rule);
        assert_eq!(findings.len(), 2);

        let first = &findings[0];
        assert_eq!(first.vuln_class(), VulnClass::SqlInjection);
        assert_eq!(first.origin().method(), "findUser");
        assert_eq!(first.origin().line(), 4);
        assert_eq!(first.evidence, "select * from users where name = '${name}'");
        assert!(first.implementation_chain().is_empty());

        assert_eq!(
            findings[1].metadata["substitutions"],
            serde_json::json!(["column", "dir"])
        );
    }
}
