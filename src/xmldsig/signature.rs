//! Enveloped XML-DSig assembly.
//!
//! Signing happens in two phases. [`DigestedSubtree::new`] takes ownership
//! of the element to be signed, canonicalizes and digests it; from then on
//! the subtree cannot be mutated. [`DigestedSubtree::seal`] builds and signs
//! `SignedInfo` and hands back the untouched subtree together with the
//! `Signature` element, which the caller inserts as a sibling.

use crate::core::SefazError;
use crate::xml::{C14N_ALGORITHM, Element, NamespaceScope, canonicalize};

use super::engine::{self, DIGEST_ALGORITHM, SIGNATURE_ALGORITHM, SigningCredential};

/// Namespace of every `Signature` element.
pub const XMLDSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Transform that removes the `Signature` from the signed content.
pub const ENVELOPED_SIGNATURE_TRANSFORM: &str =
    "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Values carried by a `Signature` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlock {
    /// `"#"` followed by the signed element's `Id`.
    pub reference_uri: String,
    pub digest_value: String,
    pub signature_value: String,
    /// Base64 DER certificate.
    pub certificate: String,
}

impl SignatureBlock {
    /// `SignedInfo` exactly as it is canonicalized and signed.
    pub fn signed_info(&self) -> Element {
        signed_info(&self.reference_uri, &self.digest_value)
    }

    /// The complete `Signature` element.
    pub fn to_element(&self) -> Element {
        Element::new("Signature")
            .attr("xmlns", XMLDSIG_NAMESPACE)
            .child(self.signed_info())
            .text_child("SignatureValue", self.signature_value.as_str())
            .child(
                Element::new("KeyInfo").child(
                    Element::new("X509Data")
                        .text_child("X509Certificate", self.certificate.as_str()),
                ),
            )
    }

    /// Read the values back from a `Signature` element.
    pub fn from_element(signature: &Element) -> Result<Self, SefazError> {
        let missing = |what: &str| SefazError::Signing(format!("Signature has no {what}"));
        let signed_info = signature.find("SignedInfo").ok_or_else(|| missing("SignedInfo"))?;
        let reference = signed_info.find("Reference").ok_or_else(|| missing("Reference"))?;
        Ok(Self {
            reference_uri: reference
                .attribute("URI")
                .ok_or_else(|| missing("Reference URI"))?
                .to_string(),
            digest_value: reference
                .find("DigestValue")
                .ok_or_else(|| missing("DigestValue"))?
                .text_content(),
            signature_value: signature
                .find("SignatureValue")
                .ok_or_else(|| missing("SignatureValue"))?
                .text_content(),
            certificate: signature
                .find("KeyInfo")
                .and_then(|k| k.find("X509Data"))
                .and_then(|d| d.find("X509Certificate"))
                .map(Element::text_content)
                .unwrap_or_default(),
        })
    }
}

fn signed_info(reference_uri: &str, digest_value: &str) -> Element {
    let algorithm = |name: &str, uri: &str| Element::new(name).attr("Algorithm", uri);
    Element::new("SignedInfo")
        .child(algorithm("CanonicalizationMethod", C14N_ALGORITHM))
        .child(algorithm("SignatureMethod", SIGNATURE_ALGORITHM))
        .child(
            Element::new("Reference")
                .attr("URI", reference_uri)
                .child(
                    Element::new("Transforms")
                        .child(algorithm("Transform", ENVELOPED_SIGNATURE_TRANSFORM))
                        .child(algorithm("Transform", C14N_ALGORITHM)),
                )
                .child(algorithm("DigestMethod", DIGEST_ALGORITHM))
                .text_child("DigestValue", digest_value),
        )
}

/// Scope seen by `SignedInfo` once the `Signature` sits under `parent_scope`.
fn signature_scope(parent_scope: &NamespaceScope) -> NamespaceScope {
    parent_scope
        .clone()
        .with_namespace("", XMLDSIG_NAMESPACE)
}

/// A subtree whose canonical form has been digested and can no longer change.
#[derive(Debug, Clone)]
pub struct DigestedSubtree {
    element: Element,
    scope: NamespaceScope,
    reference_uri: String,
    digest_value: String,
}

impl DigestedSubtree {
    /// Canonicalize `element` under `scope` (the namespaces of the parent it
    /// will sit in) and digest it. The element must carry a non-empty `Id`.
    pub fn new(element: Element, scope: NamespaceScope) -> Result<Self, SefazError> {
        let id = element
            .attribute("Id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                SefazError::Signing(format!("<{}> has no Id to reference", element.name))
            })?
            .to_string();
        let canonical = canonicalize(&element, &scope)?;
        let digest_value = engine::digest(&canonical);
        tracing::debug!(id = %id, bytes = canonical.len(), "digested subtree");
        Ok(Self {
            element,
            scope,
            reference_uri: format!("#{id}"),
            digest_value,
        })
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn reference_uri(&self) -> &str {
        &self.reference_uri
    }

    pub fn digest_value(&self) -> &str {
        &self.digest_value
    }

    /// Sign `SignedInfo` and release the subtree with its signature.
    pub fn seal(self, credential: &SigningCredential) -> Result<(Element, SignatureBlock), SefazError> {
        let info = signed_info(&self.reference_uri, &self.digest_value);
        let canonical_info = canonicalize(&info, &signature_scope(&self.scope))?;
        let signature_value = engine::sign(&canonical_info, credential.private_key())?;
        let block = SignatureBlock {
            reference_uri: self.reference_uri,
            digest_value: self.digest_value,
            signature_value,
            certificate: credential.certificate_base64(),
        };
        Ok((self.element, block))
    }
}

/// Check an enveloped signature against the element it references.
///
/// `parent_scope` is the namespace scope of the element that holds both
/// `signed` and `signature`.
pub fn verify_enveloped(
    signed: &Element,
    signature: &Element,
    parent_scope: &NamespaceScope,
    key: &rsa::RsaPublicKey,
) -> Result<(), SefazError> {
    let block = SignatureBlock::from_element(signature)?;
    let id = signed.attribute("Id").unwrap_or_default();
    if block.reference_uri != format!("#{id}") {
        return Err(SefazError::Signing(format!(
            "Reference URI {} does not point at Id '{id}'",
            block.reference_uri
        )));
    }
    let digest = engine::digest(&canonicalize(signed, parent_scope)?);
    if digest != block.digest_value {
        return Err(SefazError::Signing("digest mismatch".into()));
    }
    let signed_info = signature
        .find("SignedInfo")
        .ok_or_else(|| SefazError::Signing("Signature has no SignedInfo".into()))?;
    let canonical_info = canonicalize(signed_info, &parent_scope.descend(signature))?;
    engine::verify(&canonical_info, &block.signature_value, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CERT: &[u8] = include_bytes!("../../tests/fixtures/signer_cert.pem");
    const KEY: &[u8] = include_bytes!("../../tests/fixtures/signer_key.pem");

    fn credential() -> SigningCredential {
        SigningCredential::from_pem(CERT, KEY).unwrap()
    }

    fn scope() -> NamespaceScope {
        NamespaceScope::new().with_namespace("", "urn:doc")
    }

    fn subtree() -> Element {
        Element::new("payload")
            .attr("Id", "ID42")
            .text_child("value", "a & b")
    }

    #[test]
    fn signature_element_layout() {
        let (_, block) = DigestedSubtree::new(subtree(), scope())
            .unwrap()
            .seal(&credential())
            .unwrap();
        let sig = block.to_element();
        assert_eq!(sig.attribute("xmlns"), Some(XMLDSIG_NAMESPACE));
        let names: Vec<_> = sig.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["SignedInfo", "SignatureValue", "KeyInfo"]);

        let info = sig.find("SignedInfo").unwrap();
        let names: Vec<_> = info.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["CanonicalizationMethod", "SignatureMethod", "Reference"]);
        let reference = info.find("Reference").unwrap();
        assert_eq!(reference.attribute("URI"), Some("#ID42"));
        let transforms: Vec<_> = reference
            .find("Transforms")
            .unwrap()
            .elements()
            .map(|t| t.attribute("Algorithm").unwrap())
            .collect();
        assert_eq!(transforms, [ENVELOPED_SIGNATURE_TRANSFORM, C14N_ALGORITHM]);
    }

    #[test]
    fn sealed_signature_verifies() {
        let cred = credential();
        let (signed, block) = DigestedSubtree::new(subtree(), scope())
            .unwrap()
            .seal(&cred)
            .unwrap();
        verify_enveloped(&signed, &block.to_element(), &scope(), &cred.public_key()).unwrap();
    }

    #[test]
    fn tampering_breaks_the_digest() {
        let cred = credential();
        let (_, block) = DigestedSubtree::new(subtree(), scope())
            .unwrap()
            .seal(&cred)
            .unwrap();
        let tampered = Element::new("payload")
            .attr("Id", "ID42")
            .text_child("value", "a & c");
        assert!(
            verify_enveloped(&tampered, &block.to_element(), &scope(), &cred.public_key())
                .is_err()
        );
    }

    #[test]
    fn subtree_without_id_is_rejected() {
        assert!(matches!(
            DigestedSubtree::new(Element::new("payload"), scope()),
            Err(SefazError::Signing(_))
        ));
    }

    #[test]
    fn block_survives_element_roundtrip() {
        let (_, block) = DigestedSubtree::new(subtree(), scope())
            .unwrap()
            .seal(&credential())
            .unwrap();
        assert_eq!(SignatureBlock::from_element(&block.to_element()).unwrap(), block);
    }
}
