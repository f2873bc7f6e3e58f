//! Links mapping namespaces to their mapper interface and its implementations.

use crate::analyzer::Corpus;
use crate::models::{Diagnostic, DiagnosticKind};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Mapper interface bound to one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperBinding {
    pub namespace: String,
    /// Simple name of the interface (last namespace segment)
    pub interface: String,
    /// Qualified name of the interface declaration, when found
    pub interface_qualified: Option<String>,
    /// Simple names of implementing classes
    pub implementors: Vec<String>,
}

impl MapperBinding {
    /// Interface name followed by its implementors.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.interface.as_str()).chain(self.implementors.iter().map(String::as_str))
    }
}

/// Namespace to binding table.
#[derive(Debug, Default)]
pub struct Bindings {
    by_namespace: BTreeMap<String, MapperBinding>,
}

impl Bindings {
    pub fn get(&self, namespace: &str) -> Option<&MapperBinding> {
        self.by_namespace.get(namespace)
    }

    pub fn len(&self) -> usize {
        self.by_namespace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_namespace.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MapperBinding> {
        self.by_namespace.values()
    }
}

pub struct MapperBinder;

impl MapperBinder {
    /// Bind every namespace declared by the corpus' mapping documents.
    pub fn bind(corpus: &Corpus) -> (Bindings, Vec<Diagnostic>) {
        let mut bindings = Bindings::default();
        let mut diagnostics = Vec::new();

        for doc in corpus.mappings() {
            let namespace = doc.namespace.as_deref().unwrap_or("").trim();
            if namespace.is_empty() {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::BindingMiss,
                    Some(doc.path.clone()),
                    "mapping document has no namespace",
                ));
                continue;
            }
            if bindings.by_namespace.contains_key(namespace) {
                continue;
            }

            let (binding, misses) = Self::bind_namespace(corpus, namespace, &doc.path);
            diagnostics.extend(misses);
            bindings.by_namespace.insert(namespace.to_string(), binding);
        }

        (bindings, diagnostics)
    }

    fn bind_namespace(
        corpus: &Corpus,
        namespace: &str,
        path: &Path,
    ) -> (MapperBinding, Vec<Diagnostic>) {
        let interface = namespace.rsplit('.').next().unwrap_or(namespace).to_string();
        let mut diagnostics = Vec::new();

        let declaration = corpus
            .type_by_qualified(namespace)
            .filter(|(_, ty)| ty.is_interface())
            .or_else(|| corpus.types_named(&interface).find(|(_, ty)| ty.is_interface()));

        let interface_qualified = declaration.map(|(_, ty)| ty.qualified_name.clone());
        if interface_qualified.is_none() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::BindingMiss,
                Some(path.to_path_buf()),
                format!("no interface declaration for mapper namespace {}", namespace),
            ));
        }

        let mut implementors: Vec<String> = corpus
            .implementors_of(&interface)
            .map(|(_, ty)| ty.name.clone())
            .collect();
        implementors.sort();
        implementors.dedup();

        if implementors.is_empty() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::BindingMiss,
                Some(path.to_path_buf()),
                format!("no class implements mapper interface {}", interface),
            ));
        }

        debug!("{} -> {} {:?}", namespace, interface, implementors);

        (
            MapperBinding {
                namespace: namespace.to_string(),
                interface,
                interface_qualified,
                implementors,
            },
            diagnostics,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{parse_mapping_document, JavaFrontend};

    #[test]
    fn test_binding_and_misses() {
        let frontend = JavaFrontend::new().unwrap();
        let units = vec![
            frontend
                .parse(
                    Path::new("UserMapper.java"),
                    "package com.app.dao;\npublic interface UserMapper { User findUser(String n); }",
                )
                .unwrap(),
            frontend
                .parse(
                    Path::new("UserMapperImpl.java"),
                    "package com.app.dao;\npublic class UserMapperImpl implements UserMapper {\n  public User findUser(String n) { return null; }\n}",
                )
                .unwrap(),
        ];
        let mappings = vec![
            parse_mapping_document(
                Path::new("UserMapper.xml"),
                r#"<mapper namespace="com.app.dao.UserMapper"><select id="findUser">x</select></mapper>"#,
            )
            .unwrap(),
            parse_mapping_document(
                Path::new("OrderMapper.xml"),
                r#"<mapper namespace="com.app.dao.OrderMapper"></mapper>"#,
            )
            .unwrap(),
            parse_mapping_document(Path::new("Bare.xml"), "<mapper></mapper>").unwrap(),
        ];
        let corpus = Corpus::from_units(units, mappings);

        let (bindings, diagnostics) = MapperBinder::bind(&corpus);

        let user = bindings.get("com.app.dao.UserMapper").unwrap();
        assert_eq!(user.interface, "UserMapper");
        assert_eq!(user.interface_qualified.as_deref(), Some("com.app.dao.UserMapper"));
        assert_eq!(
            user.type_names().collect::<Vec<_>>(),
            vec!["UserMapper", "UserMapperImpl"]
        );

        let order = bindings.get("com.app.dao.OrderMapper").unwrap();
        assert!(order.interface_qualified.is_none());
        assert_eq!(bindings.len(), 2);

        // OrderMapper: no interface, no implementors; Bare.xml: no namespace
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics.iter().all(|d| d.kind == DiagnosticKind::BindingMiss));
    }
}
