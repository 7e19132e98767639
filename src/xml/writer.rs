use quick_xml::Writer;
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

use super::tree::{Element, Node};
use crate::core::SefazError;

fn xml_io(e: std::io::Error) -> SefazError {
    SefazError::Xml(format!("XML write error: {e}"))
}

/// Character data, with `\r` as a reference so a parser does not fold it
/// into a line end.
fn escape_text(text: &str) -> String {
    partial_escape(text).replace('\r', "&#xD;")
}

/// Attribute value, with whitespace as references so a parser does not
/// normalize it to spaces.
fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\t', "&#x9;")
        .replace('\n', "&#xA;")
        .replace('\r', "&#xD;")
}

/// Streaming writer for outbound messages.
///
/// Never indents: whitespace inside a signed subtree would change its digest.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    /// Writer that starts with an XML declaration.
    pub fn new() -> Result<Self, SefazError> {
        let mut w = Self::fragment();
        w.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(w)
    }

    /// Writer without a declaration.
    pub fn fragment() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    pub fn into_string(self) -> Result<String, SefazError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| SefazError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, SefazError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, SefazError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    /// Copy already-serialized markup through untouched.
    pub fn raw(&mut self, xml: &str) -> Result<&mut Self, SefazError> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(xml)))
            .map_err(xml_io)?;
        Ok(self)
    }

    /// Write a whole element tree.
    pub fn element(&mut self, el: &Element) -> Result<&mut Self, SefazError> {
        let mut start = BytesStart::new(el.name.as_str());
        for a in &el.attributes {
            let value = escape_attribute(&a.value);
            start.push_attribute((a.name.as_bytes(), value.as_bytes()));
        }
        if el.children.is_empty() {
            self.writer
                .write_event(Event::Empty(start))
                .map_err(xml_io)?;
            return Ok(self);
        }
        self.writer
            .write_event(Event::Start(start))
            .map_err(xml_io)?;
        for child in &el.children {
            match child {
                Node::Element(e) => {
                    self.element(e)?;
                }
                Node::Text(t) => {
                    self.writer
                        .write_event(Event::Text(BytesText::from_escaped(escape_text(t))))
                        .map_err(xml_io)?;
                }
            }
        }
        self.end_element(&el.name)
    }
}
