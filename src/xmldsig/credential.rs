use std::path::{Path, PathBuf};

use super::engine::SigningCredential;
use crate::core::SefazError;

/// Source of signing key material.
///
/// Implementations shared between threads must be safe for concurrent use.
pub trait CredentialProvider {
    fn load_signing_material(&self) -> Result<SigningCredential, SefazError>;
}

impl CredentialProvider for SigningCredential {
    fn load_signing_material(&self) -> Result<SigningCredential, SefazError> {
        Ok(self.clone())
    }
}

/// PEM certificate and private key, either in memory or on disk.
#[derive(Debug, Clone)]
pub enum PemCredentials {
    Memory { cert: Vec<u8>, key: Vec<u8> },
    Files { cert: PathBuf, key: PathBuf },
}

impl PemCredentials {
    pub fn from_memory(cert: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        Self::Memory {
            cert: cert.into(),
            key: key.into(),
        }
    }

    pub fn from_files(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        Self::Files {
            cert: cert.into(),
            key: key.into(),
        }
    }
}

impl CredentialProvider for PemCredentials {
    fn load_signing_material(&self) -> Result<SigningCredential, SefazError> {
        match self {
            Self::Memory { cert, key } => SigningCredential::from_pem(cert, key),
            Self::Files { cert, key } => {
                let cert_pem = read(cert)?;
                let key_pem = read(key)?;
                tracing::debug!(cert = %cert.display(), "loaded PEM credentials from disk");
                SigningCredential::from_pem(&cert_pem, &key_pem)
            }
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, SefazError> {
    std::fs::read(path)
        .map_err(|e| SefazError::Credential(format!("cannot read {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    #[test]
    fn loads_from_files() {
        let provider = PemCredentials::from_files(
            fixture("signer_cert.pem"),
            fixture("signer_key.pem"),
        );
        let cred = provider.load_signing_material().unwrap();
        assert!(!cred.certificate_der().is_empty());
    }

    #[test]
    fn missing_file_is_a_credential_error() {
        let provider = PemCredentials::from_files(
            fixture("does_not_exist.pem"),
            fixture("signer_key.pem"),
        );
        assert!(matches!(
            provider.load_signing_material(),
            Err(SefazError::Credential(_))
        ));
    }
}
