//! Backward caller search from each finding, plus the controller search.

use crate::analyzer::ScanContext;
use crate::concurrency::WorkerPool;
use crate::frontend::{receiver_type, simple_type_name, CallSite};
use crate::models::{
    CallChainSegment, Diagnostic, DiagnosticKind, Expr, Origin, SinkFinding, TypeDeclaration,
};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// A method that callers are searched for, identified by the type names it may be
/// reached through.
#[derive(Debug, Clone)]
struct Target {
    names: BTreeSet<String>,
    method: String,
    /// Rendered callee, e.g. `UserMapper.findUser (implemented by UserMapperImpl)`
    label: String,
    depth: usize,
}

impl Target {
    /// A class method reachable through the class or any of its interfaces.
    fn for_type(ty: &TypeDeclaration, method: &str, depth: usize) -> Self {
        let mut names: BTreeSet<String> = ty.interfaces.iter().cloned().collect();
        names.insert(ty.name.clone());
        Self {
            names,
            method: method.to_string(),
            label: format!("{}.{}", ty.name, method),
            depth,
        }
    }

    fn has_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Case-insensitive identifier comparison, `userMapper` against `UserMapper`.
    fn has_name_ignore_case(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    fn has_name_within(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.names
            .iter()
            .filter(|n| !n.is_empty())
            .any(|n| text.contains(&n.to_lowercase()))
    }
}

/// Reconstructs implementation and controller chains.
pub struct CallChainTracer<'a> {
    ctx: &'a ScanContext<'a>,
}

impl<'a> CallChainTracer<'a> {
    pub fn new(ctx: &'a ScanContext<'a>) -> Self {
        Self { ctx }
    }

    /// Trace every finding in parallel, keeping input order.
    ///
    /// Findings reached after the deadline expired are returned untraced and a
    /// single `BudgetExceeded` diagnostic is added.
    pub fn trace_all(
        &self,
        findings: Vec<SinkFinding>,
        pool: &WorkerPool,
    ) -> (Vec<SinkFinding>, Vec<Diagnostic>) {
        info!("Tracing {} findings", findings.len());
        let skipped = AtomicUsize::new(0);

        let traced: Vec<SinkFinding> = pool.install(|| {
            findings
                .into_par_iter()
                .map(|mut finding| {
                    if self.ctx.deadline.expired() {
                        skipped.fetch_add(1, Ordering::Relaxed);
                    } else {
                        self.trace(&mut finding);
                    }
                    finding
                })
                .collect()
        });

        let mut diagnostics = Vec::new();
        let skipped = skipped.into_inner();
        if skipped > 0 {
            warn!(
                "Run budget exceeded after {:?}; {} findings reported untraced",
                self.ctx.deadline.elapsed(),
                skipped
            );
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::BudgetExceeded,
                None,
                format!("{} findings reported without call chains", skipped),
            ));
        }

        (traced, diagnostics)
    }

    /// Append both chains to one finding.
    pub fn trace(&self, finding: &mut SinkFinding) {
        if finding.origin().class_name().is_empty() {
            debug!(
                "{}: no owning type, left without chains",
                finding.origin().describe()
            );
            return;
        }

        let origin = self.origin_target(finding.origin());
        let (implementation, discovered) = self.implementation_search(finding.origin(), &origin);

        let targets = std::iter::once(&origin).chain(discovered.iter());
        let controllers = self.controller_search(targets);

        debug!(
            "{}: {} implementation segments, {} controller segments",
            finding.origin().describe(),
            implementation.len(),
            controllers.len()
        );

        for segment in implementation {
            finding.push_implementation(segment);
        }
        for segment in controllers {
            finding.push_controller(segment);
        }
    }

    fn origin_target(&self, origin: &Origin) -> Target {
        match origin {
            Origin::Mapper {
                namespace,
                statement_id,
                ..
            } => {
                let interface = origin.class_name().to_string();
                let implementors: Vec<&str> = self
                    .ctx
                    .bindings
                    .get(namespace)
                    .map(|b| b.implementors.iter().map(String::as_str).collect())
                    .unwrap_or_default();

                let mut label = format!("{}.{}", interface, statement_id);
                if !implementors.is_empty() {
                    label.push_str(&format!(" (implemented by {})", implementors.join(", ")));
                }

                let mut names: BTreeSet<String> =
                    implementors.iter().map(|s| s.to_string()).collect();
                if !interface.is_empty() {
                    names.insert(interface);
                }

                Target {
                    names,
                    method: statement_id.clone(),
                    label,
                    depth: 0,
                }
            }
            Origin::Code {
                class,
                method,
                file,
                ..
            } => {
                let declaration = self
                    .ctx
                    .corpus
                    .types_named(class)
                    .find(|(unit, _)| &unit.path == file)
                    .or_else(|| self.ctx.corpus.types_named(class).next());
                match declaration {
                    Some((_, ty)) => Target::for_type(ty, method, 0),
                    None => Target {
                        names: BTreeSet::from([class.clone()]),
                        method: method.clone(),
                        label: format!("{}.{}", class, method),
                        depth: 0,
                    },
                }
            }
        }
    }

    /// Breadth-first search over callers. Returns the segments and every caller
    /// target discovered, in discovery order.
    fn implementation_search(
        &self,
        origin: &Origin,
        start: &Target,
    ) -> (Vec<CallChainSegment>, Vec<Target>) {
        let entry_points = &self.ctx.analysis.entry_point_annotations;
        let max_depth = self.ctx.analysis.max_chain_depth;

        let mut visited: HashSet<(String, String)> = HashSet::new();
        visited.insert((origin.class_name().to_string(), origin.method().to_string()));

        let mut segments = Vec::new();
        let mut discovered = Vec::new();
        let mut frontier = VecDeque::from([start.clone()]);

        while let Some(target) = frontier.pop_front() {
            if max_depth.is_some_and(|max| target.depth >= max) {
                continue;
            }

            for site in self.ctx.corpus.call_sites(&target.method) {
                if !self.references(&site, &target) {
                    continue;
                }
                // entry points terminate chains; the controller search records them
                if site.owner.has_any_annotation(entry_points) {
                    continue;
                }
                let key = (site.owner.name.clone(), site.method.name.clone());
                if !visited.insert(key) {
                    continue;
                }

                let depth = target.depth + 1;
                segments.push(segment(&site, &target, depth));

                if site.method.is_callable() {
                    let next = Target::for_type(site.owner, &site.method.name, depth);
                    frontier.push_back(next.clone());
                    discovered.push(next);
                }
            }
        }

        (segments, discovered)
    }

    /// Calls from entry-point classes into any of the targets. No recursion.
    fn controller_search<'t>(
        &self,
        targets: impl Iterator<Item = &'t Target>,
    ) -> Vec<CallChainSegment> {
        let entry_points = &self.ctx.analysis.entry_point_annotations;
        let mut visited: HashSet<(String, String, String)> = HashSet::new();
        let mut segments = Vec::new();

        for target in targets {
            for site in self.ctx.corpus.call_sites(&target.method) {
                if !site.owner.has_any_annotation(entry_points)
                    || !self.references_structurally(&site, target)
                {
                    continue;
                }
                let key = (
                    site.owner.name.clone(),
                    site.method.name.clone(),
                    target.label.clone(),
                );
                if visited.insert(key) {
                    segments.push(segment(&site, target, target.depth + 1));
                }
            }
        }

        segments
    }

    /// Receiver check for the implementation search: structured when the receiver
    /// type is known, textual otherwise.
    fn references(&self, site: &CallSite<'_>, target: &Target) -> bool {
        let scope = match &site.call.scope {
            Some(scope) if !site.call.is_self_call() => scope,
            _ => return target.has_name(&site.owner.name),
        };
        match receiver_type(Some(self.ctx.corpus), site, scope) {
            Some(ty) => target.has_name(simple_type_name(&ty)),
            None => target.has_name_within(scope.text()),
        }
    }

    /// Receiver check for the controller search: the receiver type, or failing
    /// that the receiver identifier, must name a target type.
    fn references_structurally(&self, site: &CallSite<'_>, target: &Target) -> bool {
        let scope = match &site.call.scope {
            Some(scope) if !site.call.is_self_call() => scope,
            _ => return target.has_name(&site.owner.name),
        };
        match receiver_type(Some(self.ctx.corpus), site, scope) {
            Some(ty) => target.has_name(simple_type_name(&ty)),
            None => match scope {
                Expr::Name(name) => target.has_name_ignore_case(name),
                Expr::Field { field, .. } => target.has_name_ignore_case(field),
                _ => false,
            },
        }
    }
}

fn segment(site: &CallSite<'_>, target: &Target, depth: usize) -> CallChainSegment {
    let call = site.call;
    let caller = if site.owner.interfaces.is_empty() {
        format!("{}.{}", site.owner.name, site.method.name)
    } else {
        format!(
            "{}.{} [implements {}]",
            site.owner.name,
            site.method.name,
            site.owner.interfaces.join(", ")
        )
    };
    let code = match site.unit.line_text(call.line) {
        "" => call.text.as_str(),
        line => line,
    };

    CallChainSegment {
        caller_class: site.owner.name.clone(),
        caller_method: site.method.name.clone(),
        callee: target.label.clone(),
        file: site.unit.path.clone(),
        line: call.line,
        depth,
        text: format!(
            "{} invokes {} at {}:{}: {}",
            caller,
            target.label,
            site.unit.path.display(),
            call.line,
            code
        ),
    }
}
