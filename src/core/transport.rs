use super::config::Endpoint;
use super::error::SefazError;

/// An outbound SOAP message, ready for the wire.
#[derive(Debug, Clone)]
pub struct SoapRequest<'a> {
    /// Complete envelope bytes.
    pub payload: &'a [u8],
    pub url: &'a str,
    /// SOAP action identifier.
    pub action: &'a str,
    /// Value for the `Content-Type` header.
    pub content_type: String,
    /// Extra headers added by the caller.
    pub headers: &'a [(String, String)],
}

impl<'a> SoapRequest<'a> {
    pub fn new(payload: &'a [u8], endpoint: &'a Endpoint) -> Self {
        Self {
            payload,
            url: &endpoint.url,
            action: &endpoint.soap_action,
            content_type: endpoint.soap_version.content_type(&endpoint.soap_action),
            headers: &[],
        }
    }

    pub fn with_headers(mut self, headers: &'a [(String, String)]) -> Self {
        self.headers = headers;
        self
    }
}

/// Request/response transport collaborator.
///
/// Implementations must map any non-success HTTP status to
/// [`SefazError::Transport`] carrying the response body. Deadlines and
/// cancellation belong to the implementation.
pub trait Transport {
    fn send(&self, request: &SoapRequest<'_>) -> Result<Vec<u8>, SefazError>;
}

impl<F> Transport for F
where
    F: Fn(&SoapRequest<'_>) -> Result<Vec<u8>, SefazError>,
{
    fn send(&self, request: &SoapRequest<'_>) -> Result<Vec<u8>, SefazError> {
        self(request)
    }
}
