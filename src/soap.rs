//! SOAP envelope skeletons and response element extraction.

use crate::core::{Endpoint, SefazError};
use crate::xml::writer::XmlWriter;

const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Wrap a serialized payload in the envelope the endpoint expects.
///
/// The payload is copied byte for byte into `nfeDadosMsg`, so anything
/// signed inside it reaches the server exactly as it was digested.
pub fn envelope(payload: &[u8], endpoint: &Endpoint) -> Result<Vec<u8>, SefazError> {
    let payload = std::str::from_utf8(payload)
        .map_err(|e| SefazError::Xml(format!("payload is not UTF-8: {e}")))?;
    let prefix = endpoint.soap_version.prefix();
    let envelope = format!("{prefix}:Envelope");
    let body = format!("{prefix}:Body");
    let xmlns = format!("xmlns:{prefix}");

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        &envelope,
        &[
            ("xmlns:xsi", XSI_NAMESPACE),
            ("xmlns:xsd", XSD_NAMESPACE),
            (xmlns.as_str(), endpoint.soap_version.envelope_namespace()),
        ],
    )?
    .start_element_with_attrs(&body, &[])?;
    if let Some(op) = &endpoint.operation {
        w.start_element_with_attrs(op, &[("xmlns", endpoint.namespace.as_str())])?;
    }
    w.start_element_with_attrs("nfeDadosMsg", &[("xmlns", endpoint.namespace.as_str())])?
        .raw(payload)?
        .end_element("nfeDadosMsg")?;
    if let Some(op) = &endpoint.operation {
        w.end_element(op)?;
    }
    w.end_element(&body)?.end_element(&envelope)?;
    Ok(w.into_string()?.into_bytes())
}

/// Slice out the first `<name ...>...</name>` element of a response body.
///
/// Only an unprefixed element matches. Fails with a protocol error when the
/// element is absent or unterminated.
pub fn extract_element<'a>(body: &'a [u8], name: &str) -> Result<&'a [u8], SefazError> {
    let open = format!("<{name}");
    let close = format!("</{name}>");

    let mut from = 0;
    let start = loop {
        let Some(pos) = find(&body[from..], open.as_bytes()) else {
            return Err(SefazError::Protocol(format!("response has no <{name}> element")));
        };
        let at = from + pos;
        match body.get(at + open.len()) {
            Some(b'>' | b'/' | b' ' | b'\t' | b'\r' | b'\n') => break at,
            // A longer name sharing the prefix, e.g. <retDistDFeIntX>.
            _ => from = at + open.len(),
        }
    };

    let tag_end = find(&body[start..], b">")
        .map(|p| start + p)
        .ok_or_else(|| SefazError::Protocol(format!("<{name}> start tag is not terminated")))?;
    if body[tag_end - 1] == b'/' {
        return Ok(&body[start..=tag_end]);
    }

    let end = find(&body[tag_end..], close.as_bytes())
        .map(|p| tag_end + p + close.len())
        .ok_or_else(|| SefazError::Protocol(format!("<{name}> is not terminated")))?;
    Ok(&body[start..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
