//! XPath selection over XML field values.

use super::{SelectorKind, XPathSelector};
use crate::error::{PredicateError, Result};
use serde_json::Value;
use std::fmt;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Document, Element, ProcessingInstruction};
use sxd_document::{parser, QName};
use sxd_xpath::{Context, Factory, XPath};
use tracing::{trace, warn};

/// Functions available to every expression.
const CORE_FUNCTIONS: &[&str] = &[
    "last",
    "position",
    "count",
    "local-name",
    "namespace-uri",
    "name",
    "string",
    "concat",
    "starts-with",
    "contains",
    "substring-before",
    "substring-after",
    "substring",
    "string-length",
    "normalize-space",
    "translate",
    "boolean",
    "not",
    "true",
    "false",
    "number",
    "sum",
    "floor",
    "ceiling",
    "round",
];

/// Node type tests, which look like calls but are not functions.
const NODE_TYPES: &[&str] = &["node", "text", "comment", "processing-instruction"];

const OPERATOR_NAMES: &[&str] = &["and", "or", "div", "mod"];

/// An XPath expression compiled for one evaluation.
///
/// Case-insensitive mode folds the expression to lowercase and, once a value
/// has been parsed, folds the names and character data of the document. The
/// markup itself is never rewritten, so CDATA sections and comments parse the
/// same in both modes. Namespace aliases are bound to whichever URI the document declares that
/// equals the alias URI ignoring ASCII case.
pub struct CompiledXPath {
    source: String,
    xpath: XPath,
    namespaces: Vec<(String, String)>,
    case_sensitive: bool,
}

impl fmt::Debug for CompiledXPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledXPath")
            .field("source", &self.source)
            .field("namespaces", &self.namespaces)
            .field("case_sensitive", &self.case_sensitive)
            .finish()
    }
}

impl CompiledXPath {
    pub fn compile(directive: &XPathSelector, case_sensitive: bool) -> Result<Self> {
        let source = fold(&directive.selector, case_sensitive);
        let malformed = || PredicateError::SelectorSyntax {
            kind: SelectorKind::XPath,
            selector: directive.selector.clone(),
        };

        let xpath = match Factory::new().build(&source) {
            Ok(Some(xpath)) => xpath,
            Ok(None) | Err(_) => return Err(malformed()),
        };

        let namespaces: Vec<(String, String)> = directive
            .ns
            .iter()
            .map(|(alias, uri)| (fold(alias, case_sensitive), uri.clone()))
            .collect();

        // Unknown functions and unbound prefixes would otherwise only fail
        // once the expression runs against a well-formed document.
        if !names_resolve(&source, &namespaces) {
            return Err(malformed());
        }

        Ok(Self {
            source,
            xpath,
            namespaces,
            case_sensitive,
        })
    }

    /// Run the expression against `text`.
    ///
    /// Text that is not well-formed XML selects nothing. Errors raised while
    /// executing the expression are reported as a malformed selector.
    pub fn select(&self, text: &str) -> Result<Option<Value>> {
        let package = match parser::parse(text) {
            Ok(package) => package,
            Err(_) => {
                warn!("xpath predicate applied to a value that is not well-formed XML");
                return Ok(None);
            }
        };
        let document = package.as_document();
        if !self.case_sensitive {
            fold_document(&document);
        }

        let declared = declared_namespaces(&document);
        let mut context = Context::new();
        for (alias, uri) in &self.namespaces {
            let bound = declared
                .iter()
                .find(|declared| declared.eq_ignore_ascii_case(uri))
                .map(String::as_str)
                .unwrap_or(uri.as_str());
            context.set_namespace(alias, bound);
        }

        let value = self
            .xpath
            .evaluate(&context, document.root())
            .map_err(|_| PredicateError::SelectorSyntax {
                kind: SelectorKind::XPath,
                selector: self.source.clone(),
            })?;

        let selected = match value {
            sxd_xpath::Value::Nodeset(nodes) => {
                let values: Vec<Value> = nodes
                    .document_order()
                    .into_iter()
                    .map(|node| Value::String(node.string_value()))
                    .collect();
                trace!("xpath {} selected {} node(s)", self.source, values.len());
                if values.is_empty() {
                    None
                } else {
                    Some(Value::Array(values))
                }
            }
            sxd_xpath::Value::Number(n) => serde_json::Number::from_f64(n).map(Value::Number),
            sxd_xpath::Value::Boolean(b) => Some(Value::Bool(b)),
            sxd_xpath::Value::String(s) => Some(Value::String(s)),
        };
        Ok(selected)
    }
}

fn fold(text: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

/// Checks the names an expression refers to before any document is seen.
/// Every function must be a core function and every prefix must be an alias.
fn names_resolve(source: &str, aliases: &[(String, String)]) -> bool {
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '"' || c == '\'' {
            match chars[i + 1..].iter().position(|&quote| quote == c) {
                Some(len) => i += len + 2,
                None => return false,
            }
            continue;
        }
        if c == '$' {
            return false;
        }
        if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            continue;
        }
        if !is_name_start(c) {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && is_name_char(chars[i]) {
            i += 1;
        }
        let name: String = chars[start..i].iter().collect();

        if chars.get(i) == Some(&':') {
            if chars.get(i + 1) == Some(&':') {
                // axis
                i += 2;
                continue;
            }
            if !aliases.iter().any(|(alias, _)| *alias == name) {
                return false;
            }
            i += 1;
            let local = i;
            while i < chars.len() && is_name_char(chars[i]) {
                i += 1;
            }
            // no prefixed functions exist
            if i > local && next_significant(&chars, i) == Some('(') {
                return false;
            }
            continue;
        }

        if next_significant(&chars, i) == Some('(')
            && !NODE_TYPES.contains(&name.as_str())
            && !OPERATOR_NAMES.contains(&name.as_str())
            && !CORE_FUNCTIONS.contains(&name.as_str())
        {
            return false;
        }
    }
    true
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars[from..].iter().copied().find(|c| !c.is_whitespace())
}

/// Lowercase every name and every piece of character data in the document.
fn fold_document(document: &Document<'_>) {
    let mut pending: Vec<Element<'_>> = Vec::new();
    for child in document.root().children() {
        match child {
            ChildOfRoot::Element(element) => pending.push(element),
            ChildOfRoot::Comment(comment) => comment.set_text(&comment.text().to_lowercase()),
            ChildOfRoot::ProcessingInstruction(pi) => fold_instruction(pi),
        }
    }

    while let Some(element) = pending.pop() {
        let name = element.name();
        let uri = name.namespace_uri().map(str::to_lowercase);
        let local = name.local_part().to_lowercase();
        element.set_name(QName::with_namespace_uri(uri.as_deref(), &local));

        let attributes: Vec<(Option<String>, String, String)> = element
            .attributes()
            .into_iter()
            .map(|attribute| {
                let name = attribute.name();
                element.remove_attribute(name);
                (
                    name.namespace_uri().map(str::to_lowercase),
                    name.local_part().to_lowercase(),
                    attribute.value().to_lowercase(),
                )
            })
            .collect();
        for (uri, local, value) in &attributes {
            element.set_attribute_value(QName::with_namespace_uri(uri.as_deref(), local), value);
        }

        for child in element.children() {
            match child {
                ChildOfElement::Element(child) => pending.push(child),
                ChildOfElement::Text(text) => text.set_text(&text.text().to_lowercase()),
                ChildOfElement::Comment(comment) => {
                    comment.set_text(&comment.text().to_lowercase())
                }
                ChildOfElement::ProcessingInstruction(pi) => fold_instruction(pi),
            }
        }
    }
}

fn fold_instruction(pi: ProcessingInstruction<'_>) {
    pi.set_target(&pi.target().to_lowercase());
    let value = pi.value().map(str::to_lowercase);
    pi.set_value(value.as_deref());
}

/// Every namespace URI used by an element or attribute in the document.
fn declared_namespaces(document: &Document<'_>) -> Vec<String> {
    let mut uris: Vec<String> = Vec::new();
    let mut pending: Vec<Element<'_>> = document
        .root()
        .children()
        .into_iter()
        .filter_map(|child| match child {
            ChildOfRoot::Element(element) => Some(element),
            _ => None,
        })
        .collect();

    while let Some(element) = pending.pop() {
        record(element.name().namespace_uri(), &mut uris);
        for attribute in element.attributes() {
            record(attribute.name().namespace_uri(), &mut uris);
        }
        for child in element.children() {
            if let ChildOfElement::Element(child) = child {
                pending.push(child);
            }
        }
    }
    uris
}

fn record(uri: Option<&str>, uris: &mut Vec<String>) {
    if let Some(uri) = uri {
        if !uris.iter().any(|known| known == uri) {
            uris.push(uri.to_string());
        }
    }
}
