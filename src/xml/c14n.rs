//! Canonical XML 1.0 (`http://www.w3.org/TR/2001/REC-xml-c14n-20010315`),
//! without comments.
//!
//! The canonicalizer works on an [`Element`] plus the [`NamespaceScope`]
//! inherited from its ancestors, so a subtree can be canonicalized exactly
//! as a verifier would see it inside its parent document, without the rest
//! of that document (e.g. a sibling `Signature`) being in scope.
//!
//! Rules applied:
//! - no XML declaration, comments or processing instructions;
//! - empty elements rendered as start/end pairs;
//! - a namespace declaration is rendered only when it differs from the one
//!   rendered by the nearest output ancestor; the apex renders every
//!   in-scope namespace;
//! - namespace declarations sorted by prefix (default first), then
//!   attributes sorted by namespace URI and local name;
//! - `xml:*` attributes of ancestors are copied onto the apex.

use std::collections::BTreeMap;

use super::tree::{Element, Node};
use crate::core::SefazError;

/// Algorithm URI for this canonicalization method.
pub const C14N_ALGORITHM: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace bindings and `xml:*` attributes inherited from ancestors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceScope {
    /// prefix → URI; the default namespace uses the empty prefix.
    namespaces: BTreeMap<String, String>,
    xml_attributes: BTreeMap<String, String>,
}

impl NamespaceScope {
    /// An empty scope (the subtree is a document root).
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope seen by a child of the given ancestors, listed outermost first.
    pub fn from_ancestors<'a>(ancestors: impl IntoIterator<Item = &'a Element>) -> Self {
        Self::from_ancestors_onto(Self::new(), ancestors)
    }

    /// Builder: bind a prefix (use `""` for the default namespace).
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    /// Scope seen by the children of `el` when `el` sits in this scope.
    pub fn descend(&self, el: &Element) -> Self {
        Self::from_ancestors_onto(self.clone(), [el])
    }

    fn from_ancestors_onto<'a>(
        mut scope: Self,
        ancestors: impl IntoIterator<Item = &'a Element>,
    ) -> Self {
        for el in ancestors {
            scope.enter(el);
            for attr in &el.attributes {
                if attr.name.starts_with("xml:") {
                    scope
                        .xml_attributes
                        .insert(attr.name.clone(), attr.value.clone());
                }
            }
        }
        scope
    }

    /// URI bound to `prefix`, if any.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.namespaces
            .get(prefix)
            .map(String::as_str)
            .filter(|uri| !uri.is_empty())
    }

    fn enter(&mut self, el: &Element) {
        for attr in &el.attributes {
            match attr.declared_prefix() {
                Some("xml") => {}
                Some(prefix) => {
                    self.namespaces
                        .insert(prefix.to_string(), attr.value.clone());
                }
                None => {}
            }
        }
    }
}

/// Canonicalize `element` as a subtree whose ancestors provide `scope`.
pub fn canonicalize(element: &Element, scope: &NamespaceScope) -> Result<Vec<u8>, SefazError> {
    let mut out = Vec::with_capacity(512);
    let rendered = BTreeMap::new();
    write_element(element, scope, &rendered, true, &mut out)?;
    Ok(out)
}

/// Parse a complete document and canonicalize its root element.
pub fn canonicalize_document(xml: &str) -> Result<Vec<u8>, SefazError> {
    let root = Element::parse(xml).map_err(|e| match e {
        SefazError::Xml(msg) => SefazError::Canonicalization(msg),
        other => other,
    })?;
    canonicalize(&root, &NamespaceScope::new())
}

fn write_element(
    el: &Element,
    parent_scope: &NamespaceScope,
    rendered: &BTreeMap<String, String>,
    apex: bool,
    out: &mut Vec<u8>,
) -> Result<(), SefazError> {
    let mut scope = parent_scope.clone();
    scope.enter(el);

    if let Some(prefix) = el.prefix() {
        if scope.resolve(prefix).is_none() {
            return Err(SefazError::Canonicalization(format!(
                "element <{}> uses unbound prefix '{prefix}'",
                el.name
            )));
        }
    }

    // Namespace nodes that differ from what the nearest output ancestor rendered.
    let mut next_rendered = rendered.clone();
    let mut ns_decls: Vec<(&str, &str)> = Vec::new();
    for (prefix, uri) in &scope.namespaces {
        if uri.is_empty() {
            // xmlns="" only matters when it undoes a rendered default namespace.
            if prefix.is_empty() && rendered.get("").is_some_and(|u| !u.is_empty()) {
                ns_decls.push(("", ""));
                next_rendered.insert(String::new(), String::new());
            }
            continue;
        }
        if rendered.get(prefix) != Some(uri) {
            ns_decls.push((prefix.as_str(), uri.as_str()));
            next_rendered.insert(prefix.clone(), uri.clone());
        }
    }

    // Ordinary attributes, keyed by (namespace URI, local name).
    let mut attrs: Vec<((&str, &str), &str, &str)> = Vec::new();
    for attr in &el.attributes {
        if attr.declared_prefix().is_some() {
            continue;
        }
        attrs.push((
            attribute_key(&attr.name, &scope)?,
            attr.name.as_str(),
            attr.value.as_str(),
        ));
    }
    if apex {
        for (name, value) in &parent_scope.xml_attributes {
            if el.attribute(name).is_none() {
                attrs.push(((XML_NAMESPACE, &name[4..]), name.as_str(), value.as_str()));
            }
        }
    }
    attrs.sort_by(|a, b| a.0.cmp(&b.0));

    out.push(b'<');
    out.extend_from_slice(el.name.as_bytes());
    for (prefix, uri) in &ns_decls {
        if prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        escape_attribute(uri, out);
        out.push(b'"');
    }
    for (_, name, value) in &attrs {
        out.push(b' ');
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b"=\"");
        escape_attribute(value, out);
        out.push(b'"');
    }
    out.push(b'>');

    for child in &el.children {
        match child {
            Node::Element(c) => write_element(c, &scope, &next_rendered, false, out)?,
            Node::Text(t) => escape_text(t, out),
        }
    }

    out.extend_from_slice(b"</");
    out.extend_from_slice(el.name.as_bytes());
    out.push(b'>');
    Ok(())
}

fn attribute_key<'a>(
    name: &'a str,
    scope: &'a NamespaceScope,
) -> Result<(&'a str, &'a str), SefazError> {
    match name.split_once(':') {
        None => Ok(("", name)),
        Some((prefix, local)) => scope
            .resolve(prefix)
            .map(|uri| (uri, local))
            .ok_or_else(|| {
                SefazError::Canonicalization(format!(
                    "attribute '{name}' uses unbound prefix '{prefix}'"
                ))
            }),
    }
}

fn escape_text(text: &str, out: &mut Vec<u8>) {
    for c in text.chars() {
        match c {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            '\r' => out.extend_from_slice(b"&#xD;"),
            c => push_char(c, out),
        }
    }
}

fn escape_attribute(value: &str, out: &mut Vec<u8>) {
    for c in value.chars() {
        match c {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '"' => out.extend_from_slice(b"&quot;"),
            '\t' => out.extend_from_slice(b"&#x9;"),
            '\n' => out.extend_from_slice(b"&#xA;"),
            '\r' => out.extend_from_slice(b"&#xD;"),
            c => push_char(c, out),
        }
    }
}

fn push_char(c: char, out: &mut Vec<u8>) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}
