//! Lowered syntax model shared by the front-ends and the analyzers.
//!
//! The front-ends translate concrete parse trees into these owned values once per
//! run. Analyzers only ever `match` on the variants here, never on parser nodes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Method name used for calls made outside of any method body
/// (field initializers, static and instance initializer blocks).
pub const UNKNOWN_METHOD: &str = "<unknown>";

/// One parsed file.
#[derive(Debug, Clone)]
pub enum SourceUnit {
    Java(JavaUnit),
    Mapping(MappingDocument),
}

/// A Java compilation unit.
#[derive(Debug, Clone, Default)]
pub struct JavaUnit {
    /// Path relative to the project root
    pub path: PathBuf,

    /// Declared package, if any
    pub package: Option<String>,

    /// Import declarations in source order
    pub imports: Vec<Import>,

    /// Type declarations, nested types flattened after their parent
    pub types: Vec<TypeDeclaration>,

    /// Raw source lines, used for evidence
    pub lines: Vec<String>,
}

impl JavaUnit {
    /// Trimmed text of a 1-based source line, empty when out of range.
    pub fn line_text(&self, line: usize) -> &str {
        line.checked_sub(1)
            .and_then(|idx| self.lines.get(idx))
            .map(|l| l.trim())
            .unwrap_or("")
    }

    /// Find a type declared in this unit by simple name.
    pub fn find_type(&self, name: &str) -> Option<&TypeDeclaration> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Single-type import whose last segment is `simple_name`.
    pub fn single_import(&self, simple_name: &str) -> Option<&Import> {
        self.imports
            .iter()
            .find(|i| !i.is_static && !i.wildcard && i.simple_name() == simple_name)
    }

    /// Packages imported on demand (`import a.b.*;`).
    pub fn wildcard_packages(&self) -> impl Iterator<Item = &str> {
        self.imports
            .iter()
            .filter(|i| i.wildcard && !i.is_static)
            .map(|i| i.path.as_str())
    }

    /// Owner class of a statically imported member, e.g. `com.alibaba.fastjson.JSON`
    /// for `import static com.alibaba.fastjson.JSON.parseObject;`.
    pub fn static_import_owner<'a>(&'a self, member: &'a str) -> Option<&'a str> {
        self.static_import_owners(member).next()
    }

    /// Every class a member could be statically imported from, single imports first.
    pub fn static_import_owners<'a>(&'a self, member: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let single = self.imports.iter().filter(|i| i.is_static && !i.wildcard).filter_map(move |i| {
            i.path
                .rsplit_once('.')
                .filter(|(_, m)| *m == member)
                .map(|(owner, _)| owner)
        });
        let on_demand = self
            .imports
            .iter()
            .filter(|i| i.is_static && i.wildcard)
            .map(|i| i.path.as_str());
        single.chain(on_demand)
    }
}

/// An import declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Dotted path without the trailing `.*`
    pub path: String,
    pub is_static: bool,
    pub wildcard: bool,
}

impl Import {
    /// Last dotted segment.
    pub fn simple_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }
}

/// Class or interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Class,
    Interface,
}

/// A type declaration.
#[derive(Debug, Clone)]
pub struct TypeDeclaration {
    pub name: String,
    pub qualified_name: String,
    pub kind: TypeKind,
    /// Simple annotation names, without `@` or arguments
    pub annotations: BTreeSet<String>,
    /// Simple names of implemented (or, for interfaces, extended) interfaces
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldDeclaration>,
    pub methods: Vec<MethodDeclaration>,
    pub line: usize,
}

impl TypeDeclaration {
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Whether any of the given annotation names is present.
    pub fn has_any_annotation<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> bool {
        names.into_iter().any(|n| self.annotations.contains(n))
    }

    pub fn field_type(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.type_name.as_str())
    }

    pub fn method(&self, name: &str) -> Option<&MethodDeclaration> {
        self.methods.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct FieldDeclaration {
    pub name: String,
    pub type_name: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Method,
    Constructor,
    /// Field initializers and initializer blocks
    Initializer,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub type_name: String,
}

/// A method, constructor or synthetic initializer.
#[derive(Debug, Clone)]
pub struct MethodDeclaration {
    /// Simple name of the owning type
    pub owner: String,
    pub name: String,
    pub kind: MethodKind,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub line: usize,
    /// Body nodes in source order
    pub body: Vec<BodyNode>,
}

impl MethodDeclaration {
    /// Synthetic holder for calls outside any method body.
    pub fn initializer(owner: impl Into<String>, line: usize) -> Self {
        Self {
            owner: owner.into(),
            name: UNKNOWN_METHOD.to_string(),
            kind: MethodKind::Initializer,
            parameters: Vec::new(),
            return_type: None,
            line,
            body: Vec::new(),
        }
    }

    /// Call expressions together with their body index.
    pub fn calls(&self) -> impl Iterator<Item = (usize, &CallExpression)> {
        self.body.iter().enumerate().filter_map(|(idx, node)| match node {
            BodyNode::Call(call) => Some((idx, call)),
            _ => None,
        })
    }

    pub fn parameter_type(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.type_name.as_str())
    }

    /// Declared type of a local variable, looking only at declarations that
    /// precede `before` in the body.
    pub fn local_type_before(&self, name: &str, before: usize) -> Option<&str> {
        self.body[..before.min(self.body.len())]
            .iter()
            .rev()
            .find_map(|node| match node {
                BodyNode::Local {
                    name: local,
                    type_name,
                    ..
                } if local == name => Some(type_name.as_str()),
                _ => None,
            })
    }

    /// Whether this is a real, callable method (not an initializer block).
    pub fn is_callable(&self) -> bool {
        self.kind != MethodKind::Initializer
    }
}

/// Body node kinds the analyzers care about.
#[derive(Debug, Clone)]
pub enum BodyNode {
    Call(CallExpression),
    Local {
        name: String,
        type_name: String,
        init: Option<Expr>,
        line: usize,
    },
    Assign {
        target: String,
        value: Expr,
        line: usize,
    },
    New {
        type_name: String,
        line: usize,
    },
}

impl BodyNode {
    pub fn line(&self) -> usize {
        match self {
            BodyNode::Call(call) => call.line,
            BodyNode::Local { line, .. }
            | BodyNode::Assign { line, .. }
            | BodyNode::New { line, .. } => *line,
        }
    }
}

/// A method invocation.
#[derive(Debug, Clone)]
pub struct CallExpression {
    pub callee: String,
    /// Receiver expression, `None` for unqualified calls
    pub scope: Option<Expr>,
    pub arguments: Vec<Expr>,
    /// 1-based line of the invocation
    pub line: usize,
    /// Verbatim invocation text
    pub text: String,
}

impl CallExpression {
    pub fn scope_text(&self) -> Option<&str> {
        self.scope.as_ref().map(Expr::text)
    }

    /// Unqualified `foo()` or `this.foo()`.
    pub fn is_self_call(&self) -> bool {
        matches!(self.scope, None | Some(Expr::This))
    }
}

/// Expression shapes relevant to sink matching and receiver resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Plain identifier
    Name(String),
    /// `object.field`
    Field {
        object: Box<Expr>,
        field: String,
        text: String,
    },
    /// Nested invocation used as a receiver or argument
    Call {
        callee: String,
        scope: Option<Box<Expr>>,
        text: String,
    },
    /// `new T(...)`
    New { type_name: String, text: String },
    /// String literal, quotes included
    Literal(String),
    /// `+` expression with at least one string literal operand
    Concat(String),
    This,
    Other(String),
}

impl Expr {
    /// Verbatim source text.
    pub fn text(&self) -> &str {
        match self {
            Expr::Name(s) | Expr::Literal(s) | Expr::Concat(s) | Expr::Other(s) => s,
            Expr::Field { text, .. } | Expr::Call { text, .. } | Expr::New { text, .. } => text,
            Expr::This => "this",
        }
    }
}

/// SQL statement element kinds recognized in mapping documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    /// Parse a local element name.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "select" => Some(StatementKind::Select),
            "insert" => Some(StatementKind::Insert),
            "update" => Some(StatementKind::Update),
            "delete" => Some(StatementKind::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
        }
    }
}

/// One SQL-producing entry inside a mapping document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingStatement {
    pub namespace: String,
    pub id: String,
    pub kind: StatementKind,
    /// Concatenated text content, nested elements included
    pub text: String,
    /// 1-based line of the opening tag
    pub line: usize,
}

/// A parsed mapping document.
#[derive(Debug, Clone, Default)]
pub struct MappingDocument {
    pub path: PathBuf,
    pub namespace: Option<String>,
    /// Whether a `<mapper>` root element was seen
    pub has_mapper_root: bool,
    pub statements: Vec<MappingStatement>,
}

impl MappingDocument {
    /// Documents that carry nothing for the SQL scanner are not kept in the corpus.
    pub fn is_relevant(&self) -> bool {
        self.has_mapper_root || !self.statements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_with_imports(imports: Vec<Import>) -> JavaUnit {
        JavaUnit {
            path: "A.java".into(),
            imports,
            ..Default::default()
        }
    }

    #[test]
    fn test_static_import_owner() {
        let unit = unit_with_imports(vec![
            Import {
                path: "com.alibaba.fastjson.JSON.parseObject".into(),
                is_static: true,
                wildcard: false,
            },
            Import {
                path: "java.util.List".into(),
                is_static: false,
                wildcard: false,
            },
        ]);

        assert_eq!(
            unit.static_import_owner("parseObject"),
            Some("com.alibaba.fastjson.JSON")
        );
        assert_eq!(unit.static_import_owner("parse"), None);
        assert!(unit.single_import("List").is_some());
    }

    #[test]
    fn test_local_type_respects_order() {
        let method = MethodDeclaration {
            owner: "A".into(),
            name: "run".into(),
            kind: MethodKind::Method,
            parameters: vec![],
            return_type: None,
            line: 1,
            body: vec![
                BodyNode::Call(CallExpression {
                    callee: "parse".into(),
                    scope: Some(Expr::Name("shell".into())),
                    arguments: vec![],
                    line: 2,
                    text: "shell.parse(x)".into(),
                }),
                BodyNode::Local {
                    name: "shell".into(),
                    type_name: "GroovyShell".into(),
                    init: None,
                    line: 3,
                },
            ],
        };

        assert_eq!(method.local_type_before("shell", 0), None);
        assert_eq!(method.local_type_before("shell", 2), Some("GroovyShell"));
    }

    #[test]
    fn test_line_text_bounds() {
        let unit = JavaUnit {
            lines: vec!["  first  ".into(), "second".into()],
            ..Default::default()
        };
        assert_eq!(unit.line_text(1), "first");
        assert_eq!(unit.line_text(0), "");
        assert_eq!(unit.line_text(3), "");
    }
}
