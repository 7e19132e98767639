//! Canonical XML 1.0 vectors.
//!
//! Run with: `cargo test --test c14n_tests`

#![cfg(feature = "core")]

use sefaz::core::SefazError;
use sefaz::xml::{Element, NamespaceScope, canonicalize, canonicalize_document};

fn c14n(xml: &str) -> String {
    String::from_utf8(canonicalize_document(xml).unwrap()).unwrap()
}

#[test]
fn start_and_end_tags() {
    let input = r#"<doc>
   <e1   />
   <e2   ></e2>
   <e3   name="elem3"   id="elem3"   />
   <e4   name="elem4"   id="elem4"   ></e4>
   <e5 a:attr="out" b:attr="sorted" attr2="all" attr="I'm"
      xmlns:b="http://www.ietf.org"
      xmlns:a="http://www.w3.org"
      xmlns="http://example.org"/>
   <e6 xmlns="" xmlns:a="http://www.w3.org">
      <e7 xmlns="http://www.ietf.org">
         <e8 xmlns="" xmlns:a="http://www.w3.org">
            <e9 xmlns="" xmlns:a="http://www.ietf.org"/>
         </e8>
      </e7>
   </e6>
</doc>"#;
    let expected = r#"<doc>
   <e1></e1>
   <e2></e2>
   <e3 id="elem3" name="elem3"></e3>
   <e4 id="elem4" name="elem4"></e4>
   <e5 xmlns="http://example.org" xmlns:a="http://www.w3.org" xmlns:b="http://www.ietf.org" attr="I'm" attr2="all" b:attr="sorted" a:attr="out"></e5>
   <e6 xmlns:a="http://www.w3.org">
      <e7 xmlns="http://www.ietf.org">
         <e8 xmlns="">
            <e9 xmlns:a="http://www.ietf.org"></e9>
         </e8>
      </e7>
   </e6>
</doc>"#;
    assert_eq!(c14n(input), expected);
}

#[test]
fn character_escaping() {
    assert_eq!(
        c14n(r#"<a v="x&#x9;y&#xA;z&#xD;" w="&gt;"><b>"quoted" &amp; 'apos' &#xD;</b></a>"#),
        "<a v=\"x&#x9;y&#xA;z&#xD;\" w=\">\"><b>\"quoted\" &amp; 'apos' &#xD;</b></a>"
    );
}

#[test]
fn cdata_becomes_escaped_text() {
    assert_eq!(c14n("<a><![CDATA[1 < 2 & 3]]></a>"), "<a>1 &lt; 2 &amp; 3</a>");
}

#[test]
fn line_ends_are_normalized() {
    assert_eq!(c14n("<a>x\r\ny\rz</a>"), "<a>x\ny\nz</a>");
    assert_eq!(c14n("<a>\r\n<b>1</b>\r\n</a>"), "<a>\n<b>1</b>\n</a>");
    assert_eq!(c14n("<a><![CDATA[p\r\nq]]></a>"), "<a>p\nq</a>");
}

#[test]
fn referenced_carriage_return_is_kept() {
    assert_eq!(c14n("<a>x&#xD;\r\ny</a>"), "<a>x&#xD;\ny</a>");
}

#[test]
fn attribute_whitespace_is_normalized() {
    assert_eq!(c14n("<a v=\"x\ty\nz\"/>"), r#"<a v="x y z"></a>"#);
    assert_eq!(c14n("<a v=\"x\r\ny\"/>"), r#"<a v="x y"></a>"#);
    assert_eq!(
        c14n("<a v=\"x&#x9;y\tz\"/>"),
        r#"<a v="x&#x9;y z"></a>"#
    );
}

#[test]
fn declaration_and_comments_removed() {
    assert_eq!(
        c14n("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!-- head -->\n<a><!-- in -->x</a>"),
        "<a>x</a>"
    );
}

#[test]
fn subtree_excludes_outer_soap_namespaces() {
    let doc = Element::parse(
        r#"<soap12:Envelope xmlns:soap12="http://www.w3.org/2003/05/soap-envelope"><soap12:Body><nfeDadosMsg xmlns="urn:wsdl"><envEvento xmlns="http://www.portalfiscal.inf.br/nfe" versao="1.00"><idLote>1</idLote><evento xmlns="http://www.portalfiscal.inf.br/nfe" versao="1.00"><infEvento Id="ID1"><cOrgao>91</cOrgao></infEvento></evento></envEvento></nfeDadosMsg></soap12:Body></soap12:Envelope>"#,
    )
    .unwrap();
    let env_evento = doc
        .find("Body")
        .and_then(|b| b.find("nfeDadosMsg"))
        .and_then(|m| m.find("envEvento"))
        .unwrap();
    let evento = env_evento.find("evento").unwrap();
    let info = evento.find("infEvento").unwrap();

    let scope = NamespaceScope::from_ancestors([env_evento, evento]);
    assert_eq!(
        String::from_utf8(canonicalize(info, &scope).unwrap()).unwrap(),
        r#"<infEvento xmlns="http://www.portalfiscal.inf.br/nfe" Id="ID1"><cOrgao>91</cOrgao></infEvento>"#
    );

    // The same subtree seen from the SOAP root picks up the envelope prefix.
    let body = doc.find("Body").unwrap();
    let dados = body.find("nfeDadosMsg").unwrap();
    let full = NamespaceScope::from_ancestors([&doc, body, dados, env_evento, evento]);
    let with_soap = String::from_utf8(canonicalize(info, &full).unwrap()).unwrap();
    assert!(with_soap.contains("xmlns:soap12="));
}

#[test]
fn canonical_form_survives_serialization() {
    let el = Element::new("infEvento")
        .attr("Id", "ID1")
        .attr("xmlns", "http://www.portalfiscal.inf.br/nfe")
        .text_child("xJust", "Mercadoria \"avariada\" & <devolvida>")
        .child(Element::new("vazio"));
    let reparsed = Element::parse(&el.to_xml().unwrap()).unwrap();
    let scope = NamespaceScope::new();
    assert_eq!(
        canonicalize(&el, &scope).unwrap(),
        canonicalize(&reparsed, &scope).unwrap()
    );
}

#[test]
fn malformed_documents_fail() {
    for bad in ["", "<a>", "<a></b>", "<a x=\"1\" x=\"2\"/>", "<p:a/>"] {
        assert!(
            matches!(canonicalize_document(bad), Err(SefazError::Canonicalization(_))),
            "expected canonicalization error for {bad:?}"
        );
    }
}
