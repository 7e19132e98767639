use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use super::writer::XmlWriter;
use crate::core::SefazError;

/// A node inside an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Character data, stored unescaped.
    Text(String),
}

/// An attribute with its unescaped value. Namespace declarations are kept
/// as ordinary attributes named `xmlns` / `xmlns:prefix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    /// The prefix this attribute declares, if it is a namespace declaration.
    /// The default namespace is reported as `""`.
    pub fn declared_prefix(&self) -> Option<&str> {
        if self.name == "xmlns" {
            Some("")
        } else {
            self.name.strip_prefix("xmlns:")
        }
    }
}

/// An owned XML element subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written (`prefix:local` or `local`).
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: append an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Builder: append a child element.
    pub fn child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder: append a child element holding only text.
    pub fn text_child(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.child(Element::new(name).text(text))
    }

    /// Builder: append character data.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    pub fn local_name(&self) -> &str {
        self.name.split_once(':').map_or(self.name.as_str(), |(_, l)| l)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given local name.
    pub fn find(&self, local_name: &str) -> Option<&Element> {
        self.elements().find(|e| e.local_name() == local_name)
    }

    /// Concatenated direct character data.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Parse a complete document (or fragment with a single root) into a tree.
    ///
    /// Comments, processing instructions and the XML declaration are dropped.
    /// Line ends are normalized to `\n` and attribute values get XML 1.0
    /// whitespace normalization, so only characters written as references
    /// (`&#xD;`, `&#x9;`, ...) survive as such.
    pub fn parse(xml: &str) -> Result<Element, SefazError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(element_from_start(e)?),
                Ok(Event::Empty(ref e)) => {
                    let el = element_from_start(e)?;
                    attach(&mut stack, &mut root, el)?;
                }
                Ok(Event::End(_)) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| SefazError::Xml("unexpected end tag".into()))?;
                    attach(&mut stack, &mut root, el)?;
                }
                Ok(Event::Text(ref e)) => {
                    let raw = std::str::from_utf8(e)
                        .map_err(|e| SefazError::Xml(format!("character data is not UTF-8: {e}")))?;
                    let text = unescape(&normalize_line_ends(raw))
                        .map_err(|e| SefazError::Xml(format!("invalid character data: {e}")))?
                        .into_owned();
                    push_text(&mut stack, &text)?;
                }
                Ok(Event::CData(ref e)) => {
                    let text = std::str::from_utf8(e)
                        .map_err(|e| SefazError::Xml(format!("CDATA is not UTF-8: {e}")))?;
                    push_text(&mut stack, &normalize_line_ends(text))?;
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(SefazError::Xml(format!(
                        "XML parse error at position {}: {e}",
                        reader.error_position()
                    )));
                }
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(SefazError::Xml(format!("unclosed element <{}>", open.name)));
        }
        root.ok_or_else(|| SefazError::Xml("document has no root element".into()))
    }

    /// Serialize without declaration or indentation.
    pub fn to_xml(&self) -> Result<String, SefazError> {
        let mut w = XmlWriter::fragment();
        w.element(self)?;
        w.into_string()
    }

    /// Serialize with an `<?xml version="1.0" encoding="UTF-8"?>` declaration.
    pub fn to_xml_document(&self) -> Result<String, SefazError> {
        let mut w = XmlWriter::new()?;
        w.element(self)?;
        w.into_string()
    }
}

fn element_from_start(e: &BytesStart<'_>) -> Result<Element, SefazError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|e| SefazError::Xml(format!("element name is not UTF-8: {e}")))?
        .to_string();
    let mut el = Element::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| SefazError::Xml(format!("malformed attribute: {e}")))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| SefazError::Xml(format!("attribute name is not UTF-8: {e}")))?
            .to_string();
        let raw = std::str::from_utf8(&attr.value)
            .map_err(|e| SefazError::Xml(format!("value of attribute {key} is not UTF-8: {e}")))?;
        let value = unescape(&normalize_attribute(raw))
            .map_err(|e| SefazError::Xml(format!("invalid value for attribute {key}: {e}")))?
            .into_owned();
        el.attributes.push(Attribute { name: key, value });
    }
    Ok(el)
}

/// `\r\n` and lone `\r` become `\n` (XML 1.0 section 2.11).
fn normalize_line_ends(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Literal whitespace in an attribute value becomes a space (XML 1.0 section 3.3.3).
fn normalize_attribute(raw: &str) -> Cow<'_, str> {
    match normalize_line_ends(raw) {
        Cow::Borrowed(s) if !s.contains(['\t', '\n']) => Cow::Borrowed(s),
        other => Cow::Owned(other.replace(['\t', '\n'], " ")),
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), SefazError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(el));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(el);
            Ok(())
        }
        None => Err(SefazError::Xml(format!(
            "more than one root element (second is <{}>)",
            el.name
        ))),
    }
}

fn push_text(stack: &mut [Element], text: &str) -> Result<(), SefazError> {
    match stack.last_mut() {
        Some(parent) => {
            if let Some(Node::Text(prev)) = parent.children.last_mut() {
                prev.push_str(text);
            } else {
                parent.children.push(Node::Text(text.to_string()));
            }
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(SefazError::Xml("character data outside the root element".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_serialize() {
        let el = Element::new("a")
            .attr("x", "1 & 2")
            .text_child("b", "<hi>")
            .child(Element::new("c"));
        assert_eq!(
            el.to_xml().unwrap(),
            r#"<a x="1 &amp; 2"><b>&lt;hi&gt;</b><c/></a>"#
        );
    }

    #[test]
    fn parse_roundtrip_keeps_structure() {
        let el = Element::parse(r#"<?xml version="1.0"?><!-- c --><r a="1"><s>t &amp; u</s><e/></r>"#)
            .unwrap();
        assert_eq!(el.name, "r");
        assert_eq!(el.attribute("a"), Some("1"));
        assert_eq!(el.find("s").unwrap().text_content(), "t & u");
        assert!(el.find("e").unwrap().children.is_empty());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(Element::parse("<a><b></a>").is_err());
        assert!(Element::parse("<a>").is_err());
        assert!(Element::parse("").is_err());
        assert!(Element::parse("<a/><b/>").is_err());
    }

    #[test]
    fn parse_normalizes_line_ends() {
        let el = Element::parse("<a>x\r\ny\rz<b><![CDATA[p\r\nq]]></b></a>").unwrap();
        assert_eq!(el.text_content(), "x\ny\nz");
        assert_eq!(el.find("b").unwrap().text_content(), "p\nq");
    }

    #[test]
    fn parse_keeps_referenced_carriage_return() {
        let el = Element::parse("<a>x&#xD;\ny</a>").unwrap();
        assert_eq!(el.text_content(), "x\r\ny");
    }

    #[test]
    fn parse_normalizes_attribute_whitespace() {
        let el = Element::parse("<a v=\"x\ty\r\nz\n\" w=\"p&#x9;q&#xA;\"/>").unwrap();
        assert_eq!(el.attribute("v"), Some("x y z "));
        assert_eq!(el.attribute("w"), Some("p\tq\n"));
    }

    #[test]
    fn whitespace_survives_serialization() {
        let el = Element::new("a").attr("v", "x\ty\nz\r").text("p\r\nq");
        let xml = el.to_xml().unwrap();
        assert_eq!(xml, "<a v=\"x&#x9;y&#xA;z&#xD;\">p&#xD;\nq</a>");
        assert_eq!(Element::parse(&xml).unwrap(), el);
    }

    #[test]
    fn names_split_prefix() {
        let el = Element::new("ds:Signature");
        assert_eq!(el.prefix(), Some("ds"));
        assert_eq!(el.local_name(), "Signature");
        assert_eq!(Element::new("evento").prefix(), None);
    }
}
