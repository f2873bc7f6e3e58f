//! Source front-ends: parsing and best-effort symbol resolution.
//!
//! The analyzers only see the lowered model in [`crate::models`]. Everything that
//! touches a concrete parser lives behind [`SourceFrontend`] and [`CallResolver`].

mod java;
mod mapper_xml;
mod resolve;

pub use java::JavaFrontend;
pub use mapper_xml::parse_mapping_document;
pub use resolve::{receiver_type, simple_type_name, CorpusResolver, NoopResolver};

use crate::error::Result;
use crate::models::{CallExpression, JavaUnit, MappingDocument, MethodDeclaration, TypeDeclaration};
use std::path::Path;

/// Turns file contents into lowered source units.
pub trait SourceFrontend: Send + Sync {
    /// Parse a Java compilation unit.
    fn parse_java_unit(&self, path: &Path, source: &str) -> Result<JavaUnit>;

    /// Parse a mapping document.
    fn parse_mapping_document(&self, path: &Path, source: &str) -> Result<MappingDocument>;
}

/// Default front-end: tree-sitter for Java, quick-xml for mapping documents.
pub struct DefaultFrontend {
    java: JavaFrontend,
}

impl DefaultFrontend {
    pub fn new() -> Result<Self> {
        Ok(Self {
            java: JavaFrontend::new()?,
        })
    }
}

impl SourceFrontend for DefaultFrontend {
    fn parse_java_unit(&self, path: &Path, source: &str) -> Result<JavaUnit> {
        self.java.parse(path, source)
    }

    fn parse_mapping_document(&self, path: &Path, source: &str) -> Result<MappingDocument> {
        parse_mapping_document(path, source)
    }
}

/// Position of a call expression inside the corpus.
#[derive(Debug, Clone, Copy)]
pub struct CallSite<'a> {
    pub unit: &'a JavaUnit,
    pub owner: &'a TypeDeclaration,
    pub method: &'a MethodDeclaration,
    /// Index of the call in the method body
    pub index: usize,
    pub call: &'a CallExpression,
}

/// Outcome of resolving a call target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Qualified signature, e.g. `java.lang.Runtime.exec`
    Resolved(String),
    /// Why the target could not be determined
    Unresolved(String),
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Best-effort mapping from a call expression to its declaring type.
pub trait CallResolver: Send + Sync {
    fn resolve_call_target(&self, site: &CallSite<'_>, call: &CallExpression) -> Resolution;
}
