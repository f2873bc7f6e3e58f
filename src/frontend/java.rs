//! Java front-end built on tree-sitter.
//!
//! Parses a compilation unit and lowers it into [`JavaUnit`]. Parsers are cached
//! per worker thread so the corpus build can fan out over rayon.

use crate::error::{AuditorError, Result};
use crate::models::{
    BodyNode, CallExpression, Expr, FieldDeclaration, Import, JavaUnit, MethodDeclaration,
    MethodKind, Parameter, TypeDeclaration, TypeKind,
};
use std::cell::RefCell;
use std::path::Path;
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, Parser, Query, QueryCursor, Tree};

use super::resolve::simple_type_name;

// Thread-local parser cache, reused across files on the same rayon worker.
thread_local! {
    static PARSER_CACHE: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

const HEADER_QUERY: &str = r#"
(package_declaration) @package
(import_declaration) @import
"#;

const TYPE_KINDS: [&str; 5] = [
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

/// tree-sitter based Java front-end.
pub struct JavaFrontend {
    header_query: Query,
}

impl JavaFrontend {
    pub fn new() -> Result<Self> {
        let language: tree_sitter::Language = tree_sitter_java::LANGUAGE.into();
        let header_query = Query::new(&language, HEADER_QUERY)
            .map_err(|e| AuditorError::Config(format!("Invalid header query: {}", e)))?;
        Ok(Self { header_query })
    }

    fn create_parser() -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| AuditorError::Config(format!("Failed to load Java grammar: {}", e)))?;
        Ok(parser)
    }

    /// Parse using the calling thread's cached parser.
    fn parse_with_cache(path: &Path, source: &str) -> Result<Tree> {
        PARSER_CACHE.with(|cache| {
            let mut cache = cache.borrow_mut();
            if cache.is_none() {
                *cache = Some(Self::create_parser()?);
            }
            let Some(parser) = cache.as_mut() else {
                return Err(AuditorError::parse(path, "parser unavailable"));
            };
            parser
                .parse(source, None)
                .ok_or_else(|| AuditorError::parse(path, "parser returned no tree"))
        })
    }

    /// Parse and lower one compilation unit.
    pub fn parse(&self, path: &Path, source: &str) -> Result<JavaUnit> {
        let tree = Self::parse_with_cache(path, source)?;
        let root = tree.root_node();

        if root.has_error() {
            let line = first_error_line(root).unwrap_or(1);
            return Err(AuditorError::parse(
                path,
                format!("syntax error near line {}", line),
            ));
        }

        let (package, imports) = self.read_header(root, source);
        let lowering = Lowering {
            src: source.as_bytes(),
            package: package.clone(),
        };

        let mut types = Vec::new();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            lowering.lower_type_tree(child, None, &mut types);
        }

        debug!(
            "Lowered {}: {} types, {} imports",
            path.display(),
            types.len(),
            imports.len()
        );

        Ok(JavaUnit {
            path: path.to_path_buf(),
            package,
            imports,
            types,
            lines: source.lines().map(String::from).collect(),
        })
    }

    fn read_header(&self, root: Node<'_>, source: &str) -> (Option<String>, Vec<Import>) {
        let mut package = None;
        let mut imports = Vec::new();
        let names = self.header_query.capture_names();

        let mut query_cursor = QueryCursor::new();
        let mut matches = query_cursor.matches(&self.header_query, root, source.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let text = capture.node.utf8_text(source.as_bytes()).unwrap_or("");
                match names.get(capture.index as usize).copied() {
                    Some("package") => package = parse_package(text),
                    Some("import") => imports.extend(parse_import(text)),
                    _ => {}
                }
            }
        }

        (package, imports)
    }
}

fn parse_package(text: &str) -> Option<String> {
    let body = text.trim().trim_end_matches(';');
    let start = body.find("package").map(|i| i + "package".len())?;
    let name: String = body[start..].chars().filter(|c| !c.is_whitespace()).collect();
    (!name.is_empty()).then_some(name)
}

fn parse_import(text: &str) -> Option<Import> {
    let body = text
        .trim()
        .strip_prefix("import")?
        .trim()
        .trim_end_matches(';')
        .trim();

    let (is_static, rest) = match body.strip_prefix("static") {
        Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest),
        _ => (false, body),
    };

    let compact: String = rest.chars().filter(|c| !c.is_whitespace()).collect();
    let wildcard = compact.ends_with(".*");
    let path = compact.trim_end_matches(".*").to_string();

    (!path.is_empty()).then_some(Import {
        path,
        is_static,
        wildcard,
    })
}

fn first_error_line(node: Node<'_>) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(line_of(node));
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error_line)
}

/// Local classes declared anywhere inside a body, outermost only.
fn collect_local_types<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if TYPE_KINDS.contains(&child.kind()) {
            out.push(child);
        } else {
            collect_local_types(child, out);
        }
    }
}

fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_comment(node: &Node<'_>) -> bool {
    matches!(node.kind(), "line_comment" | "block_comment")
}

/// Lowers tree-sitter nodes of one unit.
struct Lowering<'s> {
    src: &'s [u8],
    package: Option<String>,
}

impl<'s> Lowering<'s> {
    fn text(&self, node: Node<'_>) -> &'s str {
        node.utf8_text(self.src).unwrap_or("")
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| self.text(n).to_string())
    }

    fn lower_type_tree<'t>(
        &self,
        node: Node<'t>,
        outer: Option<&str>,
        out: &mut Vec<TypeDeclaration>,
    ) {
        let kind = match node.kind() {
            "class_declaration" | "enum_declaration" | "record_declaration" => TypeKind::Class,
            "interface_declaration" | "annotation_type_declaration" => TypeKind::Interface,
            _ => return,
        };
        let Some(name) = self.field_text(node, "name") else {
            return;
        };

        let qualified_name = match (outer, &self.package) {
            (Some(outer), _) => format!("{}.{}", outer, name),
            (None, Some(package)) => format!("{}.{}", package, name),
            (None, None) => name.clone(),
        };

        let mut decl = TypeDeclaration {
            annotations: self.annotations(node).into_iter().collect(),
            interfaces: self.interfaces(node),
            fields: Vec::new(),
            methods: Vec::new(),
            line: line_of(node),
            name,
            qualified_name,
            kind,
        };

        let mut initializer = MethodDeclaration::initializer(decl.name.clone(), decl.line);
        let mut nested = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            self.lower_members(body, &mut decl, &mut initializer, &mut nested);
        }
        if !initializer.body.is_empty() {
            decl.methods.push(initializer);
        }

        let qualified = decl.qualified_name.clone();
        out.push(decl);
        for inner in nested {
            self.lower_type_tree(inner, Some(&qualified), out);
        }
    }

    fn lower_members<'t>(
        &self,
        body: Node<'t>,
        decl: &mut TypeDeclaration,
        initializer: &mut MethodDeclaration,
        nested: &mut Vec<Node<'t>>,
    ) {
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "field_declaration" | "constant_declaration" => {
                    let type_name = member
                        .child_by_field_name("type")
                        .map(|t| self.type_name(t))
                        .unwrap_or_default();
                    let mut declarators = member.walk();
                    for declarator in member.children_by_field_name("declarator", &mut declarators) {
                        if let Some(name) = self.field_text(declarator, "name") {
                            decl.fields.push(FieldDeclaration {
                                name,
                                type_name: type_name.clone(),
                                line: line_of(declarator),
                            });
                        }
                        if let Some(value) = declarator.child_by_field_name("value") {
                            self.lower_body(value, &mut initializer.body);
                        }
                    }
                }
                "method_declaration" | "constructor_declaration" | "compact_constructor_declaration" => {
                    decl.methods.push(self.lower_method(member, &decl.name));
                    if let Some(block) = member.child_by_field_name("body") {
                        collect_local_types(block, nested);
                    }
                }
                "static_initializer" | "block" => {
                    self.lower_body(member, &mut initializer.body);
                    collect_local_types(member, nested);
                }
                "enum_body_declarations" => self.lower_members(member, decl, initializer, nested),
                "enum_constant" => {
                    if let Some(args) = member.child_by_field_name("arguments") {
                        self.lower_body(args, &mut initializer.body);
                    }
                }
                kind if TYPE_KINDS.contains(&kind) => nested.push(member),
                _ => {}
            }
        }
    }

    fn lower_method(&self, node: Node<'_>, owner: &str) -> MethodDeclaration {
        let kind = if node.kind() == "method_declaration" {
            MethodKind::Method
        } else {
            MethodKind::Constructor
        };

        let parameters = node
            .child_by_field_name("parameters")
            .map(|p| self.parameters(p))
            .unwrap_or_default();

        let return_type = match kind {
            MethodKind::Method => node.child_by_field_name("type").map(|t| self.type_name(t)),
            _ => None,
        };

        let mut body = Vec::new();
        if let Some(block) = node.child_by_field_name("body") {
            self.lower_body(block, &mut body);
        }

        MethodDeclaration {
            owner: owner.to_string(),
            name: self
                .field_text(node, "name")
                .unwrap_or_else(|| owner.to_string()),
            kind,
            parameters,
            return_type,
            line: line_of(node),
            body,
        }
    }

    fn parameters(&self, node: Node<'_>) -> Vec<Parameter> {
        let mut params = Vec::new();
        let mut cursor = node.walk();
        for param in node.named_children(&mut cursor) {
            match param.kind() {
                "formal_parameter" => {
                    let type_name = param
                        .child_by_field_name("type")
                        .map(|t| self.type_name(t))
                        .unwrap_or_default();
                    if let Some(name) = self.field_text(param, "name") {
                        params.push(Parameter { name, type_name });
                    }
                }
                "spread_parameter" => {
                    let mut inner = param.walk();
                    let children: Vec<Node<'_>> = param.named_children(&mut inner).collect();
                    let type_name = children
                        .iter()
                        .find(|c| !matches!(c.kind(), "modifiers" | "variable_declarator"))
                        .map(|t| format!("{}[]", self.type_name(*t)))
                        .unwrap_or_default();
                    let name = children
                        .iter()
                        .find(|c| c.kind() == "variable_declarator")
                        .and_then(|d| self.field_text(*d, "name"));
                    if let Some(name) = name {
                        params.push(Parameter { name, type_name });
                    }
                }
                _ => {}
            }
        }
        params
    }

    /// Walk a statement or expression subtree in source order.
    fn lower_body(&self, node: Node<'_>, out: &mut Vec<BodyNode>) {
        match node.kind() {
            kind if TYPE_KINDS.contains(&kind) => {}
            "method_invocation" => {
                self.lower_children(node, out);
                out.push(BodyNode::Call(self.call_expression(node)));
            }
            "object_creation_expression" => {
                self.lower_children(node, out);
                if let Some(t) = node.child_by_field_name("type") {
                    out.push(BodyNode::New {
                        type_name: self.type_name(t),
                        line: line_of(node),
                    });
                }
            }
            "local_variable_declaration" => {
                self.lower_children(node, out);
                let declared = node
                    .child_by_field_name("type")
                    .map(|t| self.type_name(t))
                    .unwrap_or_default();
                let mut cursor = node.walk();
                for declarator in node.children_by_field_name("declarator", &mut cursor) {
                    let Some(name) = self.field_text(declarator, "name") else {
                        continue;
                    };
                    let init = declarator.child_by_field_name("value").map(|v| self.expr(v));
                    out.push(BodyNode::Local {
                        type_name: infer_var_type(&declared, init.as_ref()),
                        name,
                        init,
                        line: line_of(declarator),
                    });
                }
            }
            "resource" => {
                self.lower_children(node, out);
                if let (Some(t), Some(name)) =
                    (node.child_by_field_name("type"), self.field_text(node, "name"))
                {
                    let init = node.child_by_field_name("value").map(|v| self.expr(v));
                    out.push(BodyNode::Local {
                        type_name: infer_var_type(&self.type_name(t), init.as_ref()),
                        name,
                        init,
                        line: line_of(node),
                    });
                }
            }
            "enhanced_for_statement" => {
                if let (Some(t), Some(name)) =
                    (node.child_by_field_name("type"), self.field_text(node, "name"))
                {
                    out.push(BodyNode::Local {
                        type_name: self.type_name(t),
                        name,
                        init: None,
                        line: line_of(node),
                    });
                }
                self.lower_children(node, out);
            }
            "assignment_expression" => {
                self.lower_children(node, out);
                self.lower_assignment(node, out);
            }
            _ => self.lower_children(node, out),
        }
    }

    fn lower_children(&self, node: Node<'_>, out: &mut Vec<BodyNode>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.lower_body(child, out);
        }
    }

    fn lower_assignment(&self, node: Node<'_>, out: &mut Vec<BodyNode>) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };

        let target = match left.kind() {
            "identifier" => self.text(left).to_string(),
            "field_access" => collapse_whitespace(self.text(left)),
            _ => return,
        };

        let operator = self.field_text(node, "operator").unwrap_or_default();
        let value = if operator == "+=" {
            Expr::Concat(collapse_whitespace(self.text(node)))
        } else {
            self.expr(right)
        };

        out.push(BodyNode::Assign {
            target,
            value,
            line: line_of(node),
        });
    }

    fn call_expression(&self, node: Node<'_>) -> CallExpression {
        let arguments = node
            .child_by_field_name("arguments")
            .map(|args| {
                let mut cursor = args.walk();
                args.named_children(&mut cursor)
                    .filter(|a| !is_comment(a))
                    .map(|a| self.expr(a))
                    .collect()
            })
            .unwrap_or_default();

        CallExpression {
            callee: self.field_text(node, "name").unwrap_or_default(),
            scope: node.child_by_field_name("object").map(|o| self.expr(o)),
            arguments,
            line: line_of(node),
            text: collapse_whitespace(self.text(node)),
        }
    }

    fn expr(&self, node: Node<'_>) -> Expr {
        let text = || collapse_whitespace(self.text(node));
        match node.kind() {
            "identifier" => Expr::Name(self.text(node).to_string()),
            "this" => Expr::This,
            "field_access" => match (
                node.child_by_field_name("object"),
                self.field_text(node, "field"),
            ) {
                (Some(object), Some(field)) => Expr::Field {
                    object: Box::new(self.expr(object)),
                    field,
                    text: text(),
                },
                _ => Expr::Other(text()),
            },
            "method_invocation" => Expr::Call {
                callee: self.field_text(node, "name").unwrap_or_default(),
                scope: node
                    .child_by_field_name("object")
                    .map(|o| Box::new(self.expr(o))),
                text: text(),
            },
            "object_creation_expression" => Expr::New {
                type_name: node
                    .child_by_field_name("type")
                    .map(|t| self.type_name(t))
                    .unwrap_or_default(),
                text: text(),
            },
            "string_literal" | "text_block" => Expr::Literal(self.text(node).to_string()),
            "binary_expression" if self.is_string_concat(node) => Expr::Concat(text()),
            "parenthesized_expression" => {
                let mut cursor = node.walk();
                let inner = node.named_children(&mut cursor).find(|c| !is_comment(c));
                inner.map(|c| self.expr(c)).unwrap_or_else(|| Expr::Other(text()))
            }
            "cast_expression" => node
                .child_by_field_name("value")
                .map(|v| self.expr(v))
                .unwrap_or_else(|| Expr::Other(text())),
            _ => Expr::Other(text()),
        }
    }

    /// `+` expression with a string literal somewhere among its operands.
    fn is_string_concat(&self, node: Node<'_>) -> bool {
        match node.kind() {
            "string_literal" | "text_block" => true,
            "binary_expression" => {
                self.field_text(node, "operator").as_deref() == Some("+")
                    && ["left", "right"].iter().any(|side| {
                        node.child_by_field_name(side)
                            .map(|operand| self.is_string_concat(operand))
                            .unwrap_or(false)
                    })
            }
            "parenthesized_expression" => {
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .any(|c| self.is_string_concat(c));
                found
            }
            _ => false,
        }
    }

    /// Type text without generics, dotted form kept.
    fn type_name(&self, node: Node<'_>) -> String {
        match node.kind() {
            "generic_type" => node
                .named_child(0)
                .map(|inner| self.type_name(inner))
                .unwrap_or_else(|| strip_generics(self.text(node))),
            "array_type" => {
                let element = node
                    .child_by_field_name("element")
                    .map(|e| self.type_name(e))
                    .unwrap_or_default();
                format!("{}[]", element)
            }
            "annotated_type" => {
                let mut cursor = node.walk();
                let last = node.named_children(&mut cursor).last();
                last.map(|t| self.type_name(t))
                    .unwrap_or_else(|| strip_generics(self.text(node)))
            }
            _ => strip_generics(self.text(node)),
        }
    }

    fn annotations(&self, node: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() != "modifiers" {
                continue;
            }
            let mut inner = child.walk();
            for annotation in child.named_children(&mut inner) {
                if matches!(annotation.kind(), "marker_annotation" | "annotation") {
                    if let Some(name) = self.field_text(annotation, "name") {
                        names.push(simple_type_name(&name).to_string());
                    }
                }
            }
        }
        names
    }

    fn interfaces(&self, node: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if !matches!(child.kind(), "super_interfaces" | "extends_interfaces") {
                continue;
            }
            let mut lists = child.walk();
            for list in child.named_children(&mut lists) {
                if list.kind() != "type_list" {
                    continue;
                }
                let mut types = list.walk();
                for ty in list.named_children(&mut types) {
                    if !is_comment(&ty) {
                        names.push(simple_type_name(&self.type_name(ty)).to_string());
                    }
                }
            }
        }
        names
    }
}

fn strip_generics(text: &str) -> String {
    text.split('<')
        .next()
        .unwrap_or(text)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// `var x = new T()` declares a `T`.
fn infer_var_type(declared: &str, init: Option<&Expr>) -> String {
    match init {
        Some(Expr::New { type_name, .. }) if declared == "var" => type_name.clone(),
        _ => declared.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNKNOWN_METHOD;

    const SERVICE: &str = r#"
package com.app.service;

import com.app.dao.UserMapper;
import java.util.*;
import static com.alibaba.fastjson.JSON.parseObject;

@Service
public class UserServiceImpl implements UserService, Auditable<String> {
    @Autowired
    private UserMapper userMapper;

    private static final Runtime RT = Runtime.getRuntime();

    public User getUser(String name) {
        GroovyShell shell = new GroovyShell();
        var builder = new ProcessBuilder("ls");
        String sql = "select * from t where n = '" + name + "'";
        sql += name;
        shell.evaluate(name);
        return userMapper.findUser(name);
    }

    static class Inner {
        void go() { this.run(); }
    }
}
"#;

    fn parse(source: &str) -> Result<JavaUnit> {
        JavaFrontend::new()
            .unwrap()
            .parse(Path::new("UserServiceImpl.java"), source)
    }

    #[test]
    fn test_header_and_types() {
        let unit = parse(SERVICE).unwrap();

        assert_eq!(unit.package.as_deref(), Some("com.app.service"));
        assert_eq!(unit.imports.len(), 3);
        assert!(unit.imports[1].wildcard);
        assert_eq!(unit.imports[1].path, "java.util");
        assert_eq!(
            unit.static_import_owner("parseObject"),
            Some("com.alibaba.fastjson.JSON")
        );

        let service = unit.find_type("UserServiceImpl").unwrap();
        assert_eq!(service.qualified_name, "com.app.service.UserServiceImpl");
        assert!(service.annotations.contains("Service"));
        assert_eq!(service.interfaces, vec!["UserService", "Auditable"]);
        assert_eq!(service.field_type("userMapper"), Some("UserMapper"));

        let inner = unit.find_type("Inner").unwrap();
        assert_eq!(inner.qualified_name, "com.app.service.UserServiceImpl.Inner");
        let go = inner.method("go").unwrap();
        let (_, call) = go.calls().next().unwrap();
        assert!(call.is_self_call());
    }

    #[test]
    fn test_method_body_lowering() {
        let unit = parse(SERVICE).unwrap();
        let service = unit.find_type("UserServiceImpl").unwrap();
        let method = service.method("getUser").unwrap();

        assert_eq!(method.parameter_type("name"), Some("String"));
        assert_eq!(method.return_type.as_deref(), Some("User"));

        let calls: Vec<_> = method.calls().map(|(_, c)| c.callee.as_str()).collect();
        assert_eq!(calls, vec!["evaluate", "findUser"]);

        let (idx, evaluate) = method.calls().next().unwrap();
        assert_eq!(evaluate.scope_text(), Some("shell"));
        assert_eq!(method.local_type_before("shell", idx), Some("GroovyShell"));
        assert_eq!(method.local_type_before("builder", idx), Some("ProcessBuilder"));

        let concat = method.body.iter().any(|node| {
            matches!(node, BodyNode::Local { name, init: Some(Expr::Concat(_)), .. } if name == "sql")
        });
        assert!(concat);
        let compound = method.body.iter().any(|node| {
            matches!(node, BodyNode::Assign { target, value: Expr::Concat(_), .. } if target == "sql")
        });
        assert!(compound);
    }

    #[test]
    fn test_field_initializer_calls_are_unknown_context() {
        let unit = parse(SERVICE).unwrap();
        let service = unit.find_type("UserServiceImpl").unwrap();
        let init = service.method(UNKNOWN_METHOD).unwrap();
        let (_, call) = init.calls().next().unwrap();
        assert_eq!(call.callee, "getRuntime");
        assert_eq!(call.scope, Some(Expr::Name("Runtime".into())));
        assert!(!init.is_callable());
    }

    #[test]
    fn test_interface_extends() {
        let unit = parse(
            "package com.app.dao;\n@Mapper\npublic interface UserMapper extends BaseMapper<User> {\n  User findUser(String name);\n}\n",
        )
        .unwrap();
        let mapper = unit.find_type("UserMapper").unwrap();
        assert!(mapper.is_interface());
        assert_eq!(mapper.interfaces, vec!["BaseMapper"]);
        assert!(mapper.method("findUser").unwrap().body.is_empty());
    }

    #[test]
    fn test_local_classes_are_lowered() {
        let unit = parse(
            r#"package com.app;
public class Jobs {
    void schedule(String cmd) {
        class Runner {
            void go() throws Exception { Runtime.getRuntime().exec(cmd); }
        }
        new Runner().go();
    }
}
"#,
        )
        .unwrap();

        let runner = unit.find_type("Runner").unwrap();
        assert_eq!(runner.qualified_name, "com.app.Jobs.Runner");
        let go = runner.method("go").unwrap();
        let callees: Vec<_> = go.calls().map(|(_, c)| c.callee.as_str()).collect();
        assert_eq!(callees, vec!["getRuntime", "exec"]);

        let schedule = unit.find_type("Jobs").unwrap().method("schedule").unwrap();
        let callees: Vec<_> = schedule.calls().map(|(_, c)| c.callee.as_str()).collect();
        assert_eq!(callees, vec!["go"]);
    }

    #[test]
    fn test_syntax_error_is_parse_failure() {
        let err = parse("public class Broken { void f( { }").unwrap_err();
        assert!(matches!(err, AuditorError::Parse { .. }));
    }
}
