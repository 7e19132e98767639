//! SHA-1 digest and RSASSA-PKCS1-v1_5 / SHA-1 signatures.
//!
//! PKCS#1 v1.5 padding is deterministic: the same key and input always
//! produce the same signature bytes.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::{Digest, Sha1};

use crate::core::SefazError;

/// `DigestMethod` algorithm URI.
pub const DIGEST_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

/// `SignatureMethod` algorithm URI.
pub const SIGNATURE_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";

/// Private key plus the DER bytes of the matching certificate.
#[derive(Clone)]
pub struct SigningCredential {
    key: RsaPrivateKey,
    certificate_der: Vec<u8>,
}

impl fmt::Debug for SigningCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredential")
            .field("certificate_der_len", &self.certificate_der.len())
            .finish_non_exhaustive()
    }
}

impl SigningCredential {
    /// Pair a key with certificate bytes as given; nothing is checked.
    pub fn new(key: RsaPrivateKey, certificate_der: Vec<u8>) -> Self {
        Self {
            key,
            certificate_der,
        }
    }

    /// Decode a PEM certificate and a PEM private key (PKCS#8 `PRIVATE KEY`
    /// or PKCS#1 `RSA PRIVATE KEY`).
    ///
    /// The certificate is not parsed as X.509: it must be a DER sequence
    /// that contains the key's RSA modulus. Validity dates, chain and key
    /// usage are left to the receiving authority.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, SefazError> {
        let cert = pem::parse(cert_pem)
            .map_err(|e| SefazError::Signing(format!("invalid certificate PEM: {e}")))?;
        if cert.tag() != "CERTIFICATE" {
            return Err(SefazError::Signing(format!(
                "expected a CERTIFICATE PEM block, got '{}'",
                cert.tag()
            )));
        }
        // Every X.509 certificate is a DER SEQUENCE.
        if cert.contents().first() != Some(&0x30) {
            return Err(SefazError::Signing("certificate is not DER encoded".into()));
        }

        let key_block = pem::parse(key_pem)
            .map_err(|e| SefazError::Signing(format!("invalid private key PEM: {e}")))?;
        let key = match key_block.tag() {
            "PRIVATE KEY" => RsaPrivateKey::from_pkcs8_der(key_block.contents())
                .map_err(|e| SefazError::Signing(format!("private key is not an RSA key: {e}")))?,
            "RSA PRIVATE KEY" => RsaPrivateKey::from_pkcs1_der(key_block.contents())
                .map_err(|e| SefazError::Signing(format!("malformed PKCS#1 RSA key: {e}")))?,
            other => {
                return Err(SefazError::Signing(format!(
                    "unsupported private key PEM block '{other}'"
                )));
            }
        };

        let modulus = key.n().to_bytes_be();
        if !cert.contents().windows(modulus.len()).any(|w| w == modulus.as_slice()) {
            return Err(SefazError::Signing(
                "private key does not match the certificate".into(),
            ));
        }

        Ok(Self::new(key, cert.into_contents()))
    }

    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate_der
    }

    /// Certificate as it appears inside `X509Certificate`.
    pub fn certificate_base64(&self) -> String {
        STANDARD.encode(&self.certificate_der)
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.key
    }
}

/// Base64 SHA-1 digest of canonical bytes.
pub fn digest(bytes: &[u8]) -> String {
    STANDARD.encode(Sha1::digest(bytes))
}

/// Base64 RSA-SHA1 signature of canonical bytes.
pub fn sign(bytes: &[u8], key: &RsaPrivateKey) -> Result<String, SefazError> {
    let hashed = Sha1::digest(bytes);
    key.sign(Pkcs1v15Sign::new::<Sha1>(), &hashed)
        .map(|sig| STANDARD.encode(sig))
        .map_err(|e| SefazError::Signing(format!("RSA-SHA1 signing failed: {e}")))
}

/// Check a base64 RSA-SHA1 signature over canonical bytes.
pub fn verify(bytes: &[u8], signature_b64: &str, key: &RsaPublicKey) -> Result<(), SefazError> {
    let signature = STANDARD
        .decode(signature_b64.trim())
        .map_err(|e| SefazError::Signing(format!("signature is not base64: {e}")))?;
    let hashed = Sha1::digest(bytes);
    key.verify(Pkcs1v15Sign::new::<Sha1>(), &hashed, &signature)
        .map_err(|e| SefazError::Signing(format!("signature does not verify: {e}")))
}
