//! Best-effort receiver typing and call target resolution over the corpus.
//!
//! There is no classpath: types are qualified from imports, the declaring
//! package and the project's own declarations, with a small table for `java.lang`.

use super::{CallResolver, CallSite, Resolution};
use crate::analyzer::Corpus;
use crate::models::{Expr, JavaUnit};

/// `java.lang` types that can appear as sink receivers or common return types.
const JAVA_LANG_TYPES: &[&str] = &[
    "Runtime",
    "ProcessBuilder",
    "Process",
    "String",
    "StringBuilder",
    "Object",
    "System",
    "Thread",
    "Class",
    "ClassLoader",
    "Math",
    "Integer",
    "Long",
    "Boolean",
];

/// Return types of JDK methods needed to follow builder chains.
const KNOWN_RETURNS: &[(&str, &str, &str)] = &[
    ("Runtime", "getRuntime", "Runtime"),
    ("ProcessBuilder", "command", "ProcessBuilder"),
    ("ProcessBuilder", "directory", "ProcessBuilder"),
    ("ProcessBuilder", "inheritIO", "ProcessBuilder"),
    ("ProcessBuilder", "redirectErrorStream", "ProcessBuilder"),
    ("ProcessBuilder", "redirectInput", "ProcessBuilder"),
    ("ProcessBuilder", "redirectOutput", "ProcessBuilder"),
    ("ProcessBuilder", "redirectError", "ProcessBuilder"),
];

/// Last dotted segment of a type, generics and array brackets removed.
pub fn simple_type_name(name: &str) -> &str {
    let base = name
        .split('<')
        .next()
        .unwrap_or(name)
        .trim()
        .trim_end_matches("[]");
    base.rsplit('.').next().unwrap_or(base)
}

fn looks_like_type(name: &str) -> bool {
    name.chars().next().map(char::is_uppercase).unwrap_or(false)
}

fn is_dotted_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .split('.')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$'))
}

/// Declared type text of a receiver expression, as written in the source.
///
/// Looks at locals declared before the call, parameters, fields of the enclosing
/// type, `new T()`, static type references and known return types, in that order.
pub fn receiver_type(corpus: Option<&Corpus>, site: &CallSite<'_>, expr: &Expr) -> Option<String> {
    match expr {
        Expr::Name(name) => site
            .method
            .local_type_before(name, site.index)
            .or_else(|| site.method.parameter_type(name))
            .or_else(|| site.owner.field_type(name))
            .map(String::from)
            .or_else(|| looks_like_type(name).then(|| name.clone())),
        Expr::This => Some(site.owner.name.clone()),
        Expr::Field {
            object,
            field,
            text,
        } => {
            if matches!(**object, Expr::This) {
                site.owner.field_type(field).map(String::from)
            } else if looks_like_type(field) && is_dotted_name(text) {
                Some(text.clone())
            } else {
                None
            }
        }
        Expr::New { type_name, .. } => Some(type_name.clone()),
        Expr::Call { callee, scope, .. } => {
            let owner = match scope {
                Some(scope) => receiver_type(corpus, site, scope)?,
                None => site.owner.name.clone(),
            };
            return_type(corpus, &owner, callee)
        }
        _ => None,
    }
}

fn return_type(corpus: Option<&Corpus>, owner: &str, method: &str) -> Option<String> {
    let owner = simple_type_name(owner);

    let declared = corpus.and_then(|corpus| {
        corpus
            .types_declaring(method)
            .filter(|(_, ty)| ty.name == owner)
            .find_map(|(_, ty)| ty.method(method).and_then(|m| m.return_type.clone()))
    });

    declared.or_else(|| {
        KNOWN_RETURNS
            .iter()
            .find(|(ty, name, _)| *ty == owner && *name == method)
            .map(|(_, _, ret)| ret.to_string())
    })
}

/// Qualify a type name as seen from `unit`.
pub fn qualify(corpus: &Corpus, unit: &JavaUnit, type_text: &str) -> Result<String, String> {
    let base = type_text
        .split('<')
        .next()
        .unwrap_or(type_text)
        .trim()
        .trim_end_matches("[]");

    if let Some((first, rest)) = base.split_once('.') {
        if !looks_like_type(first) {
            return Ok(base.to_string());
        }
        // Outer.Inner
        return qualify(corpus, unit, first).map(|outer| format!("{}.{}", outer, rest));
    }

    if let Some(import) = unit.single_import(base) {
        return Ok(import.path.clone());
    }
    if let Some(ty) = unit.find_type(base) {
        return Ok(ty.qualified_name.clone());
    }

    let same_package = match &unit.package {
        Some(package) => format!("{}.{}", package, base),
        None => base.to_string(),
    };
    if corpus.type_by_qualified(&same_package).is_some() {
        return Ok(same_package);
    }

    let candidates: Vec<String> = unit
        .wildcard_packages()
        .map(|package| format!("{}.{}", package, base))
        .filter(|q| corpus.type_by_qualified(q).is_some())
        .collect();
    let java_lang = JAVA_LANG_TYPES.contains(&base);

    match (candidates.as_slice(), java_lang) {
        ([only], false) => Ok(only.clone()),
        ([], true) => Ok(format!("java.lang.{}", base)),
        ([], false) => Err(format!(
            "type `{}` is neither declared in the project nor imported",
            base
        )),
        _ => Err(format!(
            "type `{}` is ambiguous between on-demand imports",
            base
        )),
    }
}

/// Resolver backed by the project's own declarations.
pub struct CorpusResolver<'c> {
    corpus: &'c Corpus,
}

impl<'c> CorpusResolver<'c> {
    pub fn new(corpus: &'c Corpus) -> Self {
        Self { corpus }
    }
}

impl CallResolver for CorpusResolver<'_> {
    fn resolve_call_target(&self, site: &CallSite<'_>, call: &crate::models::CallExpression) -> Resolution {
        let type_text = match &call.scope {
            None if site.owner.method(&call.callee).is_none() => {
                if let Some(owner) = site.unit.static_import_owner(&call.callee) {
                    return Resolution::Resolved(format!("{}.{}", owner, call.callee));
                }
                site.owner.name.clone()
            }
            None | Some(Expr::This) => site.owner.name.clone(),
            Some(scope) => match receiver_type(Some(self.corpus), site, scope) {
                Some(ty) => ty,
                None => {
                    return Resolution::Unresolved(format!(
                        "receiver type of `{}` is unknown",
                        scope.text()
                    ))
                }
            },
        };

        match qualify(self.corpus, site.unit, &type_text) {
            Ok(qualified) => Resolution::Resolved(format!("{}.{}", qualified, call.callee)),
            Err(reason) => Resolution::Unresolved(reason),
        }
    }
}

/// Resolver used when symbol resolution is switched off.
pub struct NoopResolver;

impl CallResolver for NoopResolver {
    fn resolve_call_target(&self, _site: &CallSite<'_>, _call: &crate::models::CallExpression) -> Resolution {
        Resolution::Unresolved("symbol resolution disabled".to_string())
    }
}
