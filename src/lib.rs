//! chain_auditor - sink detection and call-chain reconstruction for Java web
//! applications built on an MVC layer and XML-mapped SQL.
//!
//! # Features
//!
//! - **Dynamic SQL**: raw `${...}` substitution in mapping statements
//! - **Code sinks**: process spawning, fastjson parsing, script evaluation and
//!   concatenated JDBC statements, matched over a tree-sitter lowered corpus
//! - **Call chains**: cycle-safe backward caller search from every finding up to
//!   the annotated controllers that reach it
//! - **Reports**: text, JSON, SARIF 2.1.0 and HTML
//!
//! # Architecture
//!
//! Parsing, matching and tracing run on a dedicated rayon pool over one
//! immutable [`analyzer::Corpus`]; the binary only uses tokio for signals.
//!
//! # Example Usage
//!
//! ```no_run
//! use chain_auditor::{Config, Scanner, VulnClass};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scanner = Scanner::new(Config::default())?;
//!     let rows = scanner.scan(Path::new("./my-app"), VulnClass::SqlInjection)?;
//!     println!("Found {} rows", rows.len());
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod concurrency;
pub mod config;
pub mod crawler;
pub mod error;
pub mod frontend;
pub mod models;
pub mod reporter;

// Re-export commonly used types
pub use config::{Config, OutputFormat};
pub use error::{AuditorError, Result};
pub use models::{ReportRow, ScanResult, Severity, VulnClass};

use analyzer::{aggregate, Bindings, CallChainTracer, Corpus, MapperBinder, RuleCatalog, ScanContext};
use concurrency::{Deadline, WorkerPool};
use crawler::RepoTraverser;
use frontend::{CallResolver, CorpusResolver, DefaultFrontend, NoopResolver};
use models::{Diagnostic, DiagnosticKind, ScanStats};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Main scanner orchestrating all analysis phases.
pub struct Scanner {
    config: Config,

    frontend: DefaultFrontend,

    pool: WorkerPool,

    /// Externally owned budget, e.g. cancelled by a signal handler
    deadline: Option<Deadline>,
}

/// Rows and diagnostics of one analyzed corpus.
#[derive(Debug, Default)]
pub struct CorpusScan {
    pub rows: Vec<ReportRow>,
    pub diagnostics: Vec<Diagnostic>,
    pub raw_findings: usize,
    pub traced_findings: usize,
}

impl Scanner {
    /// Create a new scanner with the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let frontend = DefaultFrontend::new()?;
        let pool = WorkerPool::new(&config.concurrency)?;

        Ok(Self {
            config,
            frontend,
            pool,
            deadline: None,
        })
    }

    /// Use this deadline for every run instead of one built from the configured budget.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn run_deadline(&self) -> Deadline {
        self.deadline
            .clone()
            .unwrap_or_else(|| Deadline::from_secs(self.config.analysis.budget_secs))
    }

    fn catalog_for(&self, families: &[VulnClass]) -> RuleCatalog {
        let mut analysis = self.config.analysis.clone();
        analysis.families = families.to_vec();
        RuleCatalog::from_config(&analysis)
    }

    /// Rows for one rule family.
    pub fn scan(&self, project_root: &Path, family: VulnClass) -> Result<Vec<ReportRow>> {
        self.scan_path(project_root, &[family]).map(|result| result.rows)
    }

    /// Full scan for the given families.
    ///
    /// Only an unreadable project root is an error; everything else ends up in
    /// the result's diagnostics.
    pub fn scan_path(&self, project_root: &Path, families: &[VulnClass]) -> Result<ScanResult> {
        let start_time = Instant::now();
        let deadline = self.run_deadline();
        info!("Starting scan of {}", project_root.display());

        let mut result = ScanResult::new(project_root);

        let (corpus, mut diagnostics) = self.build_corpus(project_root)?;
        let parse_failures = diagnostics.len();

        let catalog = self.catalog_for(families);
        let scan = self.scan_corpus(&corpus, &catalog, &deadline)?;
        diagnostics.extend(scan.diagnostics);

        result.stats = ScanStats {
            java_files: corpus.units().len(),
            mapping_documents: corpus.mappings().len(),
            types_indexed: corpus.type_count(),
            call_sites_indexed: corpus.call_site_count(),
            parse_failures,
            raw_findings: scan.raw_findings,
            traced_findings: scan.traced_findings,
            rows: scan.rows.len(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        };
        result.rows = scan.rows;
        result.diagnostics = diagnostics;
        result.completed_at = chrono::Utc::now();

        info!(
            "Scan complete. {} rows from {} findings in {}ms",
            result.rows.len(),
            result.stats.raw_findings,
            result.stats.duration_ms
        );

        Ok(result)
    }

    /// Discover and parse every source file under the root.
    pub fn build_corpus(&self, project_root: &Path) -> Result<(Corpus, Vec<Diagnostic>)> {
        let mut traverser = RepoTraverser::new(project_root)
            .with_max_file_size(self.config.analysis.max_file_size as u64);
        for pattern in &self.config.analysis.ignore_patterns {
            traverser.add_ignore_pattern(pattern);
        }

        let files = traverser.get_source_files(project_root)?;
        Ok(Corpus::build(files, &self.frontend, &self.pool))
    }

    /// Detect, bind, trace and aggregate over an already built corpus.
    pub fn scan_corpus(
        &self,
        corpus: &Corpus,
        catalog: &RuleCatalog,
        deadline: &Deadline,
    ) -> Result<CorpusScan> {
        if catalog.is_empty() {
            warn!("No rules enabled");
            return Ok(CorpusScan::default());
        }

        let corpus_resolver = CorpusResolver::new(corpus);
        let resolver: &dyn CallResolver = if self.config.analysis.resolve_symbols {
            &corpus_resolver
        } else {
            &NoopResolver
        };

        let (bindings, mut diagnostics) = if catalog.mapper_rule().is_some() {
            MapperBinder::bind(corpus)
        } else {
            (Bindings::default(), Vec::new())
        };
        info!("Bound {} mapper namespaces", bindings.len());

        let ctx = ScanContext {
            corpus,
            catalog,
            resolver,
            bindings: &bindings,
            analysis: &self.config.analysis,
            deadline,
        };

        let (findings, detect_diagnostics) = ctx.detect(&self.pool)?;
        diagnostics.extend(detect_diagnostics);
        let raw_findings = findings.len();

        if deadline.expired() {
            warn!("Run budget exhausted before tracing");
        }
        let (findings, trace_diagnostics) = CallChainTracer::new(&ctx).trace_all(findings, &self.pool);
        diagnostics.extend(trace_diagnostics);

        let traced_findings = findings.iter().filter(|f| f.is_traced()).count();
        let rows = aggregate(&findings);

        for kind in [DiagnosticKind::ResolutionFailure, DiagnosticKind::BindingMiss] {
            let count = diagnostics.iter().filter(|d| d.kind == kind).count();
            if count > 0 {
                info!("{} {:?} diagnostics", count, kind);
            }
        }

        Ok(CorpusScan {
            rows,
            diagnostics,
            raw_findings,
            traced_findings,
        })
    }
}

/// Create a scanner with the default configuration.
pub fn create_scanner() -> Result<Scanner> {
    Scanner::new(Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Confidence, Origin};
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scanner() -> Scanner {
        Scanner::new(Config::builder().worker_threads(2).build()).unwrap()
    }

    fn user_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "src/main/java/com/app/dao/UserMapper.java",
            "package com.app.dao;\n\npublic interface UserMapper {\n    User findUser(String name);\n}\n",
        );
        write(
            root,
            "src/main/java/com/app/dao/UserMapperImpl.java",
            "package com.app.dao;\n\npublic class UserMapperImpl implements UserMapper {\n    public User findUser(String name) {\n        return null;\n    }\n}\n",
        );
        write(
            root,
            "src/main/java/com/app/service/UserService.java",
            "package com.app.service;\n\npublic interface UserService {\n    User getUser(String name);\n}\n",
        );
        write(
            root,
            "src/main/java/com/app/service/UserServiceImpl.java",
            r#"package com.app.service;

import com.app.dao.UserMapper;

@Service
public class UserServiceImpl implements UserService {
    @Autowired
    private UserMapper userMapper;

    public User getUser(String name) {
        return userMapper.findUser(name);
    }
}
"#,
        );
        write(
            root,
            "src/main/java/com/app/web/UserController.java",
            r#"package com.app.web;

import com.app.service.UserService;

@RestController
@RequestMapping("/users")
public class UserController {
    @Autowired
    private UserService userService;

    @GetMapping("/show")
    public User show(@RequestParam String name) {
        return userService.getUser(name);
    }
}
"#,
        );
        write(
            root,
            "src/main/resources/mapper/UserMapper.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE mapper PUBLIC "-//mybatis.org//DTD Mapper 3.0//EN" "http://mybatis.org/dtd/mybatis-3-mapper.dtd">
<mapper namespace="com.app.dao.UserMapper">
    <select id="findUser" resultType="User">
        select * from users
        <where>
            name = '${name}'
        </where>
    </select>
    <select id="findById" resultType="User">
        select * from users where id = #{id}
    </select>
</mapper>
"#,
        );
        dir
    }

    #[test]
    fn test_mapper_scenario_yields_one_combined_row() {
        let project = user_project();
        let rows = scanner().scan(project.path(), VulnClass::SqlInjection).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        match &row.origin {
            Origin::Mapper {
                namespace,
                statement_id,
                line,
                ..
            } => {
                assert_eq!(namespace, "com.app.dao.UserMapper");
                assert_eq!(statement_id, "findUser");
                assert_eq!(*line, 4);
            }
            other => panic!("unexpected origin {:?}", other),
        }
        assert_eq!(row.chain.len(), 2);
        assert!(row.chain[0].starts_with("UserServiceImpl.getUser"));
        assert!(row.chain[0].contains("UserMapperImpl"));
        assert!(row.chain[1].starts_with("UserController.show"));
    }

    #[test]
    fn test_scan_is_idempotent() {
        let project = user_project();
        let scanner = scanner();
        let first = scanner.scan_path(project.path(), &VulnClass::ALL).unwrap();
        let second = scanner.scan_path(project.path(), &VulnClass::ALL).unwrap();
        assert_eq!(first.rows, second.rows);
        assert!(first.success);
        assert_eq!(first.stats.java_files, 5);
        assert_eq!(first.stats.mapping_documents, 1);
    }

    #[test]
    fn test_callerless_and_two_controller_findings() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "src/com/app/Task.java",
            "package com.app;\n\npublic class Task {\n    public void run(String cmd) throws Exception {\n        Runtime.getRuntime().exec(cmd);\n    }\n}\n",
        );
        write(
            root,
            "src/com/app/Orphan.java",
            "package com.app;\n\npublic class Orphan {\n    void eval(String code) {\n        new GroovyShell().evaluate(code);\n    }\n}\n",
        );
        for name in ["AdminController", "OpsController"] {
            write(
                root,
                &format!("src/com/app/{}.java", name),
                &format!(
                    "package com.app;\n\n@Controller\npublic class {} {{\n    private Task task;\n\n    public void go(String c) throws Exception {{\n        task.run(c);\n    }}\n}}\n",
                    name
                ),
            );
        }

        let result = scanner().scan_path(root, &VulnClass::ALL).unwrap();

        let exec: Vec<_> = result
            .rows
            .iter()
            .filter(|r| r.vuln_class == VulnClass::CommandExec)
            .collect();
        assert_eq!(exec.len(), 2);
        assert!(exec[0].chain[0].starts_with("AdminController.go"));
        assert!(exec[1].chain[0].starts_with("OpsController.go"));
        assert_eq!(exec[0].confidence, Confidence::High);

        let script: Vec<_> = result
            .rows
            .iter()
            .filter(|r| r.vuln_class == VulnClass::ScriptExec)
            .collect();
        assert_eq!(script.len(), 1);
        assert!(script[0].chain.is_empty());
    }

    #[test]
    fn test_user_defined_runtime_is_low_confidence() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(
            root,
            "src/com/app/Runtime.java",
            "package com.app;\n\npublic class Runtime {\n    public static Runtime getRuntime() { return new Runtime(); }\n    public void exec(String c) {}\n}\n",
        );
        write(
            root,
            "src/com/app/Job.java",
            "package com.app;\n\npublic class Job {\n    void go(String c) {\n        Runtime.getRuntime().exec(c);\n        helper().exec(c);\n    }\n}\n",
        );

        let rows = scanner().scan(root, VulnClass::CommandExec).unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.confidence == Confidence::Low));
    }

    #[test]
    fn test_mapping_without_namespace_is_reported_untraced() {
        let project = TempDir::new().unwrap();
        write(
            project.path(),
            "src/main/resources/Orphan.xml",
            "<mapper>\n    <select id=\"findUser\">select * from u where n = '${n}'</select>\n</mapper>\n",
        );
        write(
            project.path(),
            "src/main/java/com/app/Unrelated.java",
            "package com.app;\n\npublic class Unrelated {\n    void go(String n) {\n        lookup().findUser(n);\n    }\n}\n",
        );

        let result = scanner().scan_path(project.path(), &[VulnClass::SqlInjection]).unwrap();

        assert_eq!(result.rows.len(), 1);
        let row = &result.rows[0];
        match &row.origin {
            Origin::Mapper {
                namespace,
                statement_id,
                line,
                ..
            } => {
                assert!(namespace.is_empty());
                assert_eq!(statement_id, "findUser");
                assert_eq!(*line, 2);
            }
            other => panic!("unexpected origin {:?}", other),
        }
        assert!(row.chain.is_empty());
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::BindingMiss));
    }

    #[test]
    fn test_parse_failures_do_not_stop_the_scan() {
        let project = user_project();
        write(project.path(), "src/main/java/Broken.java", "public class Broken {");
        write(project.path(), "src/main/resources/bad.xml", "<mapper namespace=\"x\"><select id=\"a\">");

        let result = scanner().scan_path(project.path(), &[VulnClass::SqlInjection]).unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.stats.parse_failures, 2);
        assert_eq!(
            result
                .diagnostics
                .iter()
                .filter(|d| d.kind == DiagnosticKind::ParseFailure)
                .count(),
            2
        );
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = scanner().scan_path(&missing, &VulnClass::ALL).unwrap_err();
        assert!(matches!(err, AuditorError::ProjectRoot { .. }));
    }
}
