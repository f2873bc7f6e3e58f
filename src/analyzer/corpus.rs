//! Immutable, indexed collection of everything parsed in one run.

use crate::concurrency::WorkerPool;
use crate::frontend::{CallSite, SourceFrontend};
use crate::models::{
    BodyNode, Diagnostic, DiagnosticKind, JavaUnit, MappingDocument, SourceFile, SourceKind,
    SourceUnit, TypeDeclaration,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Position of a type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TypeRef {
    unit: usize,
    ty: usize,
}

/// Position of a call expression.
#[derive(Debug, Clone, Copy)]
struct CallRef {
    unit: usize,
    ty: usize,
    method: usize,
    index: usize,
}

/// Parsed Java units and mapping documents plus lookup indices.
#[derive(Debug, Default)]
pub struct Corpus {
    units: Vec<JavaUnit>,
    mappings: Vec<MappingDocument>,
    types_by_name: HashMap<String, Vec<TypeRef>>,
    types_by_qualified: HashMap<String, TypeRef>,
    methods_by_name: HashMap<String, Vec<TypeRef>>,
    calls_by_callee: HashMap<String, Vec<CallRef>>,
    implementors: HashMap<String, Vec<TypeRef>>,
    call_site_count: usize,
}

impl Corpus {
    /// Parse every file in parallel and index the results.
    ///
    /// A file that cannot be read or parsed becomes a `ParseFailure` diagnostic.
    pub fn build(
        files: Vec<SourceFile>,
        frontend: &dyn SourceFrontend,
        pool: &WorkerPool,
    ) -> (Self, Vec<Diagnostic>) {
        info!("Building corpus from {} files", files.len());

        let parsed = pool.map_batched(files, |mut file| parse_file(frontend, &mut file));

        let mut units = Vec::new();
        let mut mappings = Vec::new();
        let mut diagnostics = Vec::new();
        for result in parsed {
            match result {
                Ok(Some(SourceUnit::Java(unit))) => units.push(unit),
                Ok(Some(SourceUnit::Mapping(doc))) => mappings.push(doc),
                Ok(None) => {}
                Err(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        let corpus = Self::from_units(units, mappings);
        info!(
            "Corpus ready: {} Java units, {} mapping documents, {} types, {} call sites ({} files skipped)",
            corpus.units.len(),
            corpus.mappings.len(),
            corpus.types_by_qualified.len(),
            corpus.call_site_count,
            diagnostics.len()
        );
        (corpus, diagnostics)
    }

    /// Index already-lowered units.
    pub fn from_units(units: Vec<JavaUnit>, mappings: Vec<MappingDocument>) -> Self {
        let mut corpus = Self {
            units,
            mappings,
            ..Default::default()
        };

        for (ui, unit) in corpus.units.iter().enumerate() {
            for (ti, ty) in unit.types.iter().enumerate() {
                let type_ref = TypeRef { unit: ui, ty: ti };

                corpus
                    .types_by_name
                    .entry(ty.name.clone())
                    .or_default()
                    .push(type_ref);
                corpus
                    .types_by_qualified
                    .entry(ty.qualified_name.clone())
                    .or_insert(type_ref);

                if !ty.is_interface() {
                    for interface in &ty.interfaces {
                        corpus
                            .implementors
                            .entry(interface.clone())
                            .or_default()
                            .push(type_ref);
                    }
                }

                for (mi, method) in ty.methods.iter().enumerate() {
                    let declaring = corpus.methods_by_name.entry(method.name.clone()).or_default();
                    if declaring.last() != Some(&type_ref) {
                        declaring.push(type_ref);
                    }

                    for (index, call) in method.calls() {
                        corpus
                            .calls_by_callee
                            .entry(call.callee.clone())
                            .or_default()
                            .push(CallRef {
                                unit: ui,
                                ty: ti,
                                method: mi,
                                index,
                            });
                        corpus.call_site_count += 1;
                    }
                }
            }
        }

        corpus
    }

    pub fn units(&self) -> &[JavaUnit] {
        &self.units
    }

    pub fn mappings(&self) -> &[MappingDocument] {
        &self.mappings
    }

    pub fn type_count(&self) -> usize {
        self.types_by_qualified.len()
    }

    pub fn call_site_count(&self) -> usize {
        self.call_site_count
    }

    fn resolve_type(&self, r: &TypeRef) -> Option<(&JavaUnit, &TypeDeclaration)> {
        let unit = self.units.get(r.unit)?;
        Some((unit, unit.types.get(r.ty)?))
    }

    /// Every type declaration with its unit.
    pub fn types(&self) -> impl Iterator<Item = (&JavaUnit, &TypeDeclaration)> {
        self.units
            .iter()
            .flat_map(|unit| unit.types.iter().map(move |ty| (unit, ty)))
    }

    /// Types with the given simple name.
    pub fn types_named<'a>(
        &'a self,
        name: &str,
    ) -> impl Iterator<Item = (&'a JavaUnit, &'a TypeDeclaration)> + 'a {
        self.types_by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(move |r| self.resolve_type(r))
    }

    pub fn type_by_qualified(&self, qualified: &str) -> Option<(&JavaUnit, &TypeDeclaration)> {
        self.types_by_qualified
            .get(qualified)
            .and_then(|r| self.resolve_type(r))
    }

    /// Classes listing `interface` among their implemented interfaces.
    pub fn implementors_of<'a>(
        &'a self,
        interface: &str,
    ) -> impl Iterator<Item = (&'a JavaUnit, &'a TypeDeclaration)> + 'a {
        self.implementors
            .get(interface)
            .into_iter()
            .flatten()
            .filter_map(move |r| self.resolve_type(r))
    }

    /// Types declaring a method with this name.
    pub fn types_declaring<'a>(
        &'a self,
        method: &str,
    ) -> impl Iterator<Item = (&'a JavaUnit, &'a TypeDeclaration)> + 'a {
        self.methods_by_name
            .get(method)
            .into_iter()
            .flatten()
            .filter_map(move |r| self.resolve_type(r))
    }

    /// Every call site invoking a method with this name.
    pub fn call_sites<'a>(&'a self, callee: &str) -> impl Iterator<Item = CallSite<'a>> + 'a {
        self.calls_by_callee
            .get(callee)
            .into_iter()
            .flatten()
            .filter_map(move |r| self.call_site(r))
    }

    fn call_site(&self, r: &CallRef) -> Option<CallSite<'_>> {
        let unit = self.units.get(r.unit)?;
        let owner = unit.types.get(r.ty)?;
        let method = owner.methods.get(r.method)?;
        match method.body.get(r.index)? {
            BodyNode::Call(call) => Some(CallSite {
                unit,
                owner,
                method,
                index: r.index,
                call,
            }),
            _ => None,
        }
    }
}

fn parse_file(
    frontend: &dyn SourceFrontend,
    file: &mut SourceFile,
) -> std::result::Result<Option<SourceUnit>, Diagnostic> {
    let path = file.path.clone();
    let kind = file.kind;
    let failure = |message: String| {
        warn!("Skipping {}: {}", path.display(), message);
        Diagnostic::new(DiagnosticKind::ParseFailure, Some(path.clone()), message)
    };

    let content = file
        .load_content()
        .map_err(|e| failure(format!("unreadable: {}", e)))?;

    let unit = match kind {
        SourceKind::Java => frontend
            .parse_java_unit(&path, content)
            .map(SourceUnit::Java),
        SourceKind::MapperXml => frontend
            .parse_mapping_document(&path, content)
            .map(SourceUnit::Mapping),
        SourceKind::Unknown => return Ok(None),
    }
    .map_err(|e| failure(e.to_string()))?;

    if let SourceUnit::Mapping(doc) = &unit {
        if !doc.is_relevant() {
            debug!("No mapper element in {}", path.display());
            return Ok(None);
        }
    }

    Ok(Some(unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConcurrencyConfig;
    use crate::frontend::DefaultFrontend;

    fn files() -> Vec<SourceFile> {
        vec![
            SourceFile::in_memory(
                "UserMapper.java",
                "package com.app.dao;\npublic interface UserMapper { User findUser(String n); }",
            ),
            SourceFile::in_memory(
                "UserMapperImpl.java",
                "package com.app.dao;\npublic class UserMapperImpl implements UserMapper {\n  public User findUser(String n) { return null; }\n}",
            ),
            SourceFile::in_memory(
                "UserService.java",
                "package com.app.service;\npublic class UserService {\n  UserMapper m;\n  User get(String n) { return m.findUser(n); }\n}",
            ),
            SourceFile::in_memory("Broken.java", "public class Broken {"),
            SourceFile::in_memory(
                "UserMapper.xml",
                "<mapper namespace=\"com.app.dao.UserMapper\"><select id=\"findUser\">${n}</select></mapper>",
            ),
            SourceFile::in_memory("pom.xml", "<project/>"),
        ]
    }

    #[test]
    fn test_build_indexes_and_collects_failures() {
        let pool = WorkerPool::new(&ConcurrencyConfig {
            worker_threads: 2,
            batch_size: 2,
        })
        .unwrap();
        let frontend = DefaultFrontend::new().unwrap();

        let (corpus, diagnostics) = Corpus::build(files(), &frontend, &pool);

        assert_eq!(corpus.units().len(), 3);
        assert_eq!(corpus.mappings().len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::ParseFailure);

        let implementors: Vec<_> = corpus
            .implementors_of("UserMapper")
            .map(|(_, ty)| ty.name.as_str())
            .collect();
        assert_eq!(implementors, vec!["UserMapperImpl"]);

        assert!(corpus.type_by_qualified("com.app.dao.UserMapper").is_some());
        assert_eq!(corpus.types_declaring("findUser").count(), 2);

        let sites: Vec<_> = corpus.call_sites("findUser").collect();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].owner.name, "UserService");
        assert_eq!(sites[0].method.name, "get");
        assert_eq!(corpus.call_sites("missing").count(), 0);
    }
}
