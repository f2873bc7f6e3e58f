//! Detection and call-chain reconstruction.
//!
//! Phases run in order over one immutable [`Corpus`]: the dynamic-SQL scanner and
//! the sink matcher produce raw findings, the binder links mapping namespaces to
//! Java types, the tracer appends call chains and the aggregator flattens
//! everything into report rows.

mod aggregator;
mod binder;
mod corpus;
mod dynamic_sql;
mod matcher;
mod rules;
mod tracer;

pub use aggregator::{aggregate, expand, fingerprint};
pub use binder::{Bindings, MapperBinder, MapperBinding};
pub use corpus::Corpus;
pub use dynamic_sql::DynamicSqlScanner;
pub use matcher::{MatchOutput, SinkMatcher};
pub use rules::{builtin_rules, Predicate, RuleCatalog, SinkRule};
pub use tracer::CallChainTracer;

use crate::concurrency::{Deadline, WorkerPool};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::frontend::CallResolver;
use crate::models::{Diagnostic, SinkFinding};
use rayon::prelude::*;
use tracing::info;

/// Everything one run's phases read. Nothing in here is mutated after the
/// corpus is built.
pub struct ScanContext<'a> {
    pub corpus: &'a Corpus,
    pub catalog: &'a RuleCatalog,
    pub resolver: &'a dyn CallResolver,
    pub bindings: &'a Bindings,
    pub analysis: &'a AnalysisConfig,
    pub deadline: &'a Deadline,
}

impl ScanContext<'_> {
    /// Raw findings from mapping documents and Java code, in corpus order.
    pub fn detect(&self, pool: &WorkerPool) -> Result<(Vec<SinkFinding>, Vec<Diagnostic>)> {
        let mut findings = Vec::new();
        let mut diagnostics = Vec::new();

        if let Some(rule) = self.catalog.mapper_rule() {
            let scanner = DynamicSqlScanner::new()?;
            let per_doc: Vec<Vec<SinkFinding>> = pool.install(|| {
                self.corpus
                    .mappings()
                    .par_iter()
                    .map(|doc| scanner.scan(doc, rule))
                    .collect()
            });
            let count = findings.len();
            findings.extend(per_doc.into_iter().flatten());
            info!("Dynamic SQL scan: {} findings", findings.len() - count);
        }

        if self.catalog.has_code_rules() {
            let matcher = SinkMatcher::new(
                self.catalog,
                self.resolver,
                &self.analysis.entry_point_annotations,
            );
            let per_unit: Vec<MatchOutput> = pool.install(|| {
                self.corpus
                    .units()
                    .par_iter()
                    .map(|unit| matcher.match_unit(unit))
                    .collect()
            });
            let count = findings.len();
            for output in per_unit {
                findings.extend(output.findings);
                diagnostics.extend(output.diagnostics);
            }
            info!("Sink matching: {} findings", findings.len() - count);
        }

        Ok((findings, diagnostics))
    }
}
