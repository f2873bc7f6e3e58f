//! Evaluates catalog rules against every call expression of the Java corpus.

use crate::analyzer::rules::{Predicate, RuleCatalog, SinkRule};
use crate::frontend::{simple_type_name, CallResolver, CallSite, Resolution};
use crate::models::{
    BodyNode, Confidence, Diagnostic, DiagnosticKind, Expr, JavaUnit, MethodDeclaration, Origin,
    SinkFinding,
};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::debug;

/// Findings and diagnostics produced for one unit.
#[derive(Debug, Default)]
pub struct MatchOutput {
    pub findings: Vec<SinkFinding>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of evaluating one rule on one call.
enum Verdict {
    NotSink,
    Sink {
        confidence: Confidence,
        metadata: Vec<(&'static str, Value)>,
    },
    /// Matched by name only; the reason goes into a diagnostic
    NameOnly(String),
}

pub struct SinkMatcher<'a> {
    catalog: &'a RuleCatalog,
    resolver: &'a dyn CallResolver,
    entry_points: &'a BTreeSet<String>,
}

impl<'a> SinkMatcher<'a> {
    pub fn new(
        catalog: &'a RuleCatalog,
        resolver: &'a dyn CallResolver,
        entry_points: &'a BTreeSet<String>,
    ) -> Self {
        Self {
            catalog,
            resolver,
            entry_points,
        }
    }

    /// Walk every call of every method in declaration order.
    pub fn match_unit(&self, unit: &JavaUnit) -> MatchOutput {
        let mut output = MatchOutput::default();

        for owner in &unit.types {
            let entry_point = owner.has_any_annotation(self.entry_points);

            for method in &owner.methods {
                for (index, call) in method.calls() {
                    let site = CallSite {
                        unit,
                        owner,
                        method,
                        index,
                        call,
                    };

                    for rule in self.catalog.code_rules_for(&call.callee) {
                        let (confidence, metadata) = match self.evaluate(rule, &site) {
                            Verdict::NotSink => continue,
                            Verdict::Sink {
                                confidence,
                                metadata,
                            } => (confidence, metadata),
                            Verdict::NameOnly(reason) => {
                                output.diagnostics.push(Diagnostic::new(
                                    DiagnosticKind::ResolutionFailure,
                                    Some(unit.path.clone()),
                                    format!(
                                        "{} at line {} matched by name only: {}",
                                        rule.id, call.line, reason
                                    ),
                                ));
                                (
                                    Confidence::Low,
                                    vec![("resolution", json!("unresolved")), ("reason", json!(reason))],
                                )
                            }
                        };

                        debug!(
                            "{} in {}.{} at {}:{}",
                            rule.id,
                            owner.name,
                            method.name,
                            unit.path.display(),
                            call.line
                        );

                        let evidence = match unit.line_text(call.line) {
                            "" => call.text.clone(),
                            line => line.to_string(),
                        };
                        let origin = Origin::Code {
                            class: owner.name.clone(),
                            method: method.name.clone(),
                            file: unit.path.clone(),
                            line: call.line,
                        };

                        let mut finding = SinkFinding::new(rule.class, origin, rule.id, evidence)
                            .with_severity(rule.severity)
                            .with_confidence(confidence)
                            .with_metadata("callee", json!(call.callee))
                            .with_metadata("cwe", json!(rule.cwe()));
                        if let Some(receiver) = call.scope_text() {
                            finding = finding.with_metadata("receiver", json!(receiver));
                        }
                        for (key, value) in metadata {
                            finding = finding.with_metadata(key, value);
                        }
                        finding.origin_is_entry_point = entry_point;

                        output.findings.push(finding);
                    }
                }
            }
        }

        output
    }

    fn evaluate(&self, rule: &SinkRule, site: &CallSite<'_>) -> Verdict {
        match rule.predicate {
            Predicate::ProcessSpawn => self.process_spawn(rule, site),
            Predicate::JsonBinding => json_binding(rule, site),
            Predicate::ScriptEngine => script_engine(rule, site),
            Predicate::JdbcConcat => jdbc_concat(rule, site),
            Predicate::MapperSubstitution => Verdict::NotSink,
        }
    }

    fn process_spawn(&self, rule: &SinkRule, site: &CallSite<'_>) -> Verdict {
        let call = site.call;
        match self.resolver.resolve_call_target(site, call) {
            Resolution::Resolved(signature) => {
                let declaring = signature
                    .strip_suffix(call.callee.as_str())
                    .and_then(|s| s.strip_suffix('.'))
                    .unwrap_or(&signature);

                if rule.receivers.contains(&declaring) {
                    Verdict::Sink {
                        confidence: rule.confidence,
                        metadata: vec![("resolved_signature", json!(signature))],
                    }
                } else if rule
                    .receivers
                    .iter()
                    .any(|r| simple_type_name(r) == simple_type_name(declaring))
                {
                    // A project type shadowing the JDK name: keep it, but never at full confidence
                    Verdict::Sink {
                        confidence: Confidence::Low,
                        metadata: vec![
                            ("resolved_signature", json!(signature)),
                            ("resolution", json!("shadowed")),
                        ],
                    }
                } else {
                    debug!("{} resolves to {}, not a sink", call.text, signature);
                    Verdict::NotSink
                }
            }
            Resolution::Unresolved(reason) => {
                let hint_ok = match rule.fallback_hint {
                    None => true,
                    Some(hint) => {
                        call.scope_text()
                            .map(|text| text.to_lowercase().contains(hint))
                            .unwrap_or(false)
                            || declared_receiver(site).is_some_and(|ty| {
                                rule.receivers
                                    .iter()
                                    .any(|r| simple_type_name(r) == simple_type_name(ty))
                            })
                    }
                };
                if hint_ok {
                    Verdict::NameOnly(reason)
                } else {
                    Verdict::NotSink
                }
            }
        }
    }
}

fn json_binding(rule: &SinkRule, site: &CallSite<'_>) -> Verdict {
    let call = site.call;
    let matched = match &call.scope {
        Some(scope) => {
            let text = scope.text();
            if rule.receivers.contains(&text) {
                true
            } else if !text.contains('.') && rule.receivers.iter().any(|r| simple_type_name(r) == text) {
                // a single-type import of a same-named class from elsewhere wins
                match site.unit.single_import(text) {
                    Some(import) => rule.receivers.contains(&import.path.as_str()),
                    None => true,
                }
            } else {
                false
            }
        }
        None => {
            site.owner.method(&call.callee).is_none()
                && site
                    .unit
                    .static_import_owners(&call.callee)
                    .any(|owner| rule.receivers.contains(&owner))
        }
    };

    if matched {
        Verdict::Sink {
            confidence: rule.confidence,
            metadata: Vec::new(),
        }
    } else {
        Verdict::NotSink
    }
}

/// Type a variable holds at `before`: the latest declaration or `new` assignment,
/// then the method parameters.
fn variable_type<'m>(method: &'m MethodDeclaration, name: &str, before: usize) -> Option<&'m str> {
    method
        .body
        .iter()
        .take(before)
        .rev()
        .find_map(|node| match node {
            BodyNode::Local {
                name: local,
                type_name,
                init,
                ..
            } if local == name => Some(match init {
                Some(Expr::New { type_name, .. }) => type_name.as_str(),
                _ => type_name.as_str(),
            }),
            BodyNode::Assign {
                target,
                value: Expr::New { type_name, .. },
                ..
            } if target == name => Some(type_name.as_str()),
            _ => None,
        })
        .or_else(|| method.parameter_type(name))
}

/// Receiver type as written in the enclosing method: an inline `new T()` or a
/// variable's declared or assigned type.
fn declared_receiver<'m>(site: &CallSite<'m>) -> Option<&'m str> {
    match &site.call.scope {
        Some(Expr::New { type_name, .. }) => Some(type_name.as_str()),
        Some(Expr::Name(name)) => variable_type(site.method, name, site.index),
        _ => None,
    }
}

fn script_engine(rule: &SinkRule, site: &CallSite<'_>) -> Verdict {
    match declared_receiver(site) {
        Some(engine)
            if rule
                .receivers
                .iter()
                .any(|r| simple_type_name(r) == simple_type_name(engine)) =>
        {
            Verdict::Sink {
                confidence: rule.confidence,
                metadata: vec![("engine_type", json!(engine))],
            }
        }
        _ => Verdict::NotSink,
    }
}

/// Concatenated text a variable was last given before `before`.
fn concat_value<'m>(method: &'m MethodDeclaration, name: &str, before: usize) -> Option<&'m str> {
    method
        .body
        .iter()
        .take(before)
        .rev()
        .find_map(|node| match node {
            BodyNode::Local {
                name: local, init, ..
            } if local == name => Some(init.as_ref()),
            BodyNode::Assign { target, value, .. } if target == name => Some(Some(value)),
            _ => None,
        })
        .flatten()
        .and_then(|value| match value {
            Expr::Concat(text) => Some(text.as_str()),
            _ => None,
        })
}

fn jdbc_concat(rule: &SinkRule, site: &CallSite<'_>) -> Verdict {
    let tainted = site.call.arguments.iter().find_map(|arg| match arg {
        Expr::Concat(text) => Some(text.as_str()),
        Expr::Name(name) => concat_value(site.method, name, site.index),
        _ => None,
    });

    match tainted {
        Some(expression) => Verdict::Sink {
            confidence: rule.confidence,
            metadata: vec![("sql_expression", json!(expression))],
        },
        None => Verdict::NotSink,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Corpus;
    use crate::config::default_entry_point_annotations;
    use crate::frontend::{CorpusResolver, JavaFrontend, NoopResolver};
    use crate::models::VulnClass;
    use std::path::Path;

    fn corpus(sources: &[(&str, &str)]) -> Corpus {
        let frontend = JavaFrontend::new().unwrap();
        let units = sources
            .iter()
            .map(|(path, src)| frontend.parse(Path::new(path), src).unwrap())
            .collect();
        Corpus::from_units(units, Vec::new())
    }

    fn run(corpus: &Corpus, resolver: &dyn CallResolver) -> MatchOutput {
        let catalog = RuleCatalog::builtin();
        let entry_points = default_entry_point_annotations();
        let matcher = SinkMatcher::new(&catalog, resolver, &entry_points);
        let mut all = MatchOutput::default();
        for unit in corpus.units() {
            let out = matcher.match_unit(unit);
            all.findings.extend(out.findings);
            all.diagnostics.extend(out.diagnostics);
        }
        all
    }

    const EXEC: &str = r#"package com.app.task;

public class Task {
    public void run(String cmd) throws Exception {
        Runtime.getRuntime().exec(cmd);
    }

    public void build(String cmd) throws Exception {
        ProcessBuilder pb = new ProcessBuilder(cmd);
        pb.start();
    }

    public void thread() {
        new Thread(() -> {}).start();
    }
}
"#;

    #[test]
    fn test_command_exec_resolved() {
        let corpus = corpus(&[("Task.java", EXEC)]);
        let resolver = CorpusResolver::new(&corpus);
        let out = run(&corpus, &resolver);

        let ids: Vec<_> = out.findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["COMMAND_EXEC_RUNTIME", "COMMAND_EXEC_PROCESS_BUILDER"]);
        assert!(out.findings.iter().all(|f| f.confidence == Confidence::High));
        assert_eq!(out.findings[0].evidence, "Runtime.getRuntime().exec(cmd);");
        assert_eq!(out.findings[0].origin().line(), 5);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_command_exec_without_resolution_is_low_confidence() {
        let corpus = corpus(&[("Task.java", EXEC)]);
        let out = run(&corpus, &NoopResolver);

        // `pb` is typed from its declaration; `new Thread(..).start()` is not
        let ids: Vec<_> = out.findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["COMMAND_EXEC_RUNTIME", "COMMAND_EXEC_PROCESS_BUILDER"]);
        assert!(out.findings.iter().all(|f| f.confidence == Confidence::Low));
        assert_eq!(out.findings[1].origin().method(), "build");
        assert_eq!(out.diagnostics.len(), 2);
        assert!(out
            .diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::ResolutionFailure));
    }

    #[test]
    fn test_shadowing_runtime_is_kept_at_low_confidence() {
        let corpus = corpus(&[
            (
                "Runtime.java",
                "package com.app;\npublic class Runtime {\n  public static Runtime getRuntime() { return new Runtime(); }\n  public void exec(String c) {}\n}",
            ),
            (
                "Job.java",
                "package com.app;\npublic class Job {\n  void go(String c) {\n    Runtime.getRuntime().exec(c);\n  }\n}",
            ),
        ]);
        let resolver = CorpusResolver::new(&corpus);
        let out = run(&corpus, &resolver);

        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].confidence, Confidence::Low);
        assert_eq!(out.findings[0].metadata["resolution"], json!("shadowed"));
    }

    #[test]
    fn test_unrelated_exec_is_not_a_sink() {
        let corpus = corpus(&[(
            "Shell.java",
            "package com.app;\npublic class Shell {\n  void exec(String c) {}\n  void go(String c) { exec(c); new Shell().exec(c); }\n}",
        )]);
        let resolver = CorpusResolver::new(&corpus);
        assert!(run(&corpus, &resolver).findings.is_empty());
    }

    #[test]
    fn test_fastjson_receivers_and_static_import() {
        let corpus = corpus(&[(
            "Api.java",
            r#"package com.app.web;
import com.alibaba.fastjson.JSON;
import static com.alibaba.fastjson.JSONObject.parseObject;

@RestController
public class Api {
    public Object a(String body) { return JSON.parseObject(body); }
    public Object b(String body) { return com.alibaba.fastjson.JSONArray.parseArray(body); }
    public Object c(String body) { return parseObject(body); }
    public Object d(String body) { return mapper.parse(body); }
}
"#,
        )]);
        let out = run(&corpus, &NoopResolver);

        let methods: Vec<_> = out.findings.iter().map(|f| f.origin().method()).collect();
        assert_eq!(methods, vec!["a", "b", "c"]);
        assert!(out
            .findings
            .iter()
            .all(|f| f.vuln_class() == VulnClass::Deserialization && f.origin_is_entry_point));
    }

    #[test]
    fn test_other_json_library_is_ignored() {
        let corpus = corpus(&[(
            "Api.java",
            "package com.app;\nimport org.json.JSONObject;\npublic class Api {\n  Object a(String s) { return JSONObject.parse(s); }\n}",
        )]);
        assert!(run(&corpus, &NoopResolver).findings.is_empty());
    }

    #[test]
    fn test_script_engine_tracking_is_order_sensitive() {
        let corpus = corpus(&[(
            "Eval.java",
            r#"package com.app;
public class Eval {
    public Object a(String code) {
        GroovyShell shell = new GroovyShell();
        return shell.evaluate(code);
    }
    public Object b(String code) {
        return new GroovyShell().parse(code);
    }
    public Object c(ScriptEngine engine, String code) throws Exception {
        return engine.eval(code);
    }
    public Object d(String code) {
        return shell.evaluate(code);
    }
    public Object e(String code) {
        Object loader;
        loader = new GroovyClassLoader();
        return ((GroovyClassLoader) loader).parseClass(code);
    }
}
"#,
        )]);
        let out = run(&corpus, &NoopResolver);

        let methods: Vec<_> = out.findings.iter().map(|f| f.origin().method()).collect();
        assert_eq!(methods, vec!["a", "b", "c", "e"]);
        assert!(out.findings.iter().all(|f| f.vuln_class() == VulnClass::ScriptExec));
    }

    #[test]
    fn test_jdbc_concat() {
        let corpus = corpus(&[(
            "Dao.java",
            r#"package com.app;
public class Dao {
    public void a(Statement st, String id) throws Exception {
        String sql = "select * from t where id = " + id;
        st.executeQuery(sql);
    }
    public void b(JdbcTemplate jdbc, String id) {
        jdbc.queryForList("select * from t where id = '" + id + "'");
    }
    public void c(Statement st) throws Exception {
        String sql = "select 1";
        st.executeQuery(sql);
    }
}
"#,
        )]);
        let out = run(&corpus, &NoopResolver);

        let methods: Vec<_> = out.findings.iter().map(|f| f.origin().method()).collect();
        assert_eq!(methods, vec!["a", "b"]);
        assert!(out.findings.iter().all(|f| f.rule_id == "SQL_JDBC_CONCAT"));
    }
}
