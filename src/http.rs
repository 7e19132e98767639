//! Blocking HTTPS transport on `reqwest`.
//!
//! The authority requires mutual TLS: the client presents the same
//! ICP-Brasil certificate used for signing. Pass it as a PEM bundle
//! (certificate followed by private key) through [`HttpTransportBuilder::identity_pem`].

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};

use crate::core::{SefazError, ServiceConfig, SoapRequest, Transport};

fn transport_error(message: impl Into<String>) -> SefazError {
    SefazError::Transport {
        status: None,
        message: message.into(),
        body: Vec::new(),
    }
}

/// [`Transport`] over a blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Client with the configured timeout and no client certificate.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, SefazError> {
        Self::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug, Default)]
pub struct HttpTransportBuilder {
    timeout: Option<Duration>,
    identity_pem: Option<Vec<u8>>,
    root_certificates_pem: Vec<Vec<u8>>,
}

impl HttpTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Client certificate and key, PEM encoded in one buffer.
    pub fn identity_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.identity_pem = Some(pem.into());
        self
    }

    /// Extra trusted root (the ICP-Brasil chain is not in every trust store).
    pub fn add_root_certificate_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.root_certificates_pem.push(pem.into());
        self
    }

    pub fn build(self) -> Result<HttpTransport, SefazError> {
        let mut builder = Client::builder().timeout(self.timeout.unwrap_or(Duration::from_secs(30)));
        if let Some(pem) = &self.identity_pem {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| SefazError::Credential(format!("invalid TLS identity: {e}")))?;
            builder = builder.identity(identity);
        }
        for pem in &self.root_certificates_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| SefazError::Credential(format!("invalid root certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| transport_error(format!("cannot build HTTP client: {e}")))?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &SoapRequest<'_>) -> Result<Vec<u8>, SefazError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&request.content_type)
                .map_err(|e| transport_error(format!("invalid content type: {e}")))?,
        );
        // SOAP 1.1 only; SOAP 1.2 carries the action in the content type.
        if request.content_type.starts_with("text/xml") {
            headers.insert(
                HeaderName::from_static("soapaction"),
                HeaderValue::from_str(&format!("\"{}\"", request.action))
                    .map_err(|e| transport_error(format!("invalid SOAP action: {e}")))?,
            );
        }
        for (name, value) in request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| transport_error(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| transport_error(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        tracing::debug!(url = %request.url, bytes = request.payload.len(), "POST");
        let response = self
            .client
            .post(request.url)
            .headers(headers)
            .body(request.payload.to_vec())
            .send()
            .map_err(|e| transport_error(format!("request to {} failed: {e}", request.url)))?;

        let status = response.status();
        let body = response
            .bytes()
            .map_err(|e| SefazError::Transport {
                status: Some(status.as_u16()),
                message: format!("cannot read response body: {e}"),
                body: Vec::new(),
            })?
            .to_vec();

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), bytes = body.len(), "non-success HTTP status");
            return Err(SefazError::Transport {
                status: Some(status.as_u16()),
                message: format!("HTTP {status} from {}", request.url),
                body,
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_without_identity() {
        let transport = HttpTransport::from_config(&ServiceConfig::homologation());
        assert!(transport.is_ok());
    }

    #[test]
    fn garbage_identity_is_a_credential_error() {
        let result = HttpTransport::builder()
            .identity_pem(b"not a pem".to_vec())
            .build();
        assert!(matches!(result, Err(SefazError::Credential(_))));
    }
}
