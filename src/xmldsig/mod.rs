//! Enveloped XML signatures: C14N 1.0, SHA-1 digest, RSA-SHA1.
//!
//! ```no_run
//! use sefaz::xml::{Element, NamespaceScope};
//! use sefaz::xmldsig::{CredentialProvider, DigestedSubtree, PemCredentials};
//!
//! let credential = PemCredentials::from_files("cert.pem", "key.pem")
//!     .load_signing_material()?;
//! let subtree = Element::new("infEvento").attr("Id", "ID1");
//! let scope = NamespaceScope::new().with_namespace("", "http://www.portalfiscal.inf.br/nfe");
//! let (subtree, signature) = DigestedSubtree::new(subtree, scope)?.seal(&credential)?;
//! let parent = Element::new("evento").child(subtree).child(signature.to_element());
//! # Ok::<(), sefaz::core::SefazError>(())
//! ```

mod credential;
mod engine;
mod signature;

pub use credential::{CredentialProvider, PemCredentials};
pub use engine::{
    DIGEST_ALGORITHM, SIGNATURE_ALGORITHM, SigningCredential, digest, sign, verify,
};
pub use signature::{
    DigestedSubtree, ENVELOPED_SIGNATURE_TRANSFORM, SignatureBlock, XMLDSIG_NAMESPACE,
    verify_enveloped,
};
