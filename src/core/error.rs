use thiserror::Error;

use super::types::Nsu;

/// Errors that can occur while building, signing, sending or parsing
/// NF-e web service messages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SefazError {
    /// Input to the canonicalizer was malformed or used an unbound prefix.
    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    /// Key material was malformed or not usable with RSA-SHA1.
    #[error("signing error: {0}")]
    Signing(String),

    /// Certificate or key could not be loaded.
    #[error("credential error: {0}")]
    Credential(String),

    /// Connectivity failure or non-success HTTP status.
    #[error("transport error: {message}")]
    Transport {
        /// HTTP status, when the server answered at all.
        status: Option<u16>,
        message: String,
        /// Raw response body for diagnostics.
        body: Vec<u8>,
    },

    /// An expected element was absent or unterminated in a response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A distributed document could not be base64/gzip decoded.
    #[error("decode error at NSU {nsu}: {message}")]
    Decode { nsu: Nsu, message: String },

    /// A structurally required element was missing or malformed.
    #[error("mapping error in {context}: {message}")]
    Mapping { context: String, message: String },

    /// A document could not be gzip/base64 encoded.
    #[error("encode error: {0}")]
    Encode(String),

    /// Caller input violated a schema rule before anything was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),
}

impl SefazError {
    pub(crate) fn mapping(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            context: context.into(),
            message: message.into(),
        }
    }

    /// The response body attached to a transport failure, if any.
    pub fn response_body(&self) -> Option<&[u8]> {
        match self {
            Self::Transport { body, .. } if !body.is_empty() => Some(body),
            _ => None,
        }
    }
}

/// A recoverable problem found while reading a response.
///
/// The offending field is left at its zero value; the warning keeps the
/// leniency observable to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// Element path of the field (e.g. "retDistDFeInt.dhResp").
    pub field: String,
    /// The raw text that failed to parse.
    pub value: String,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({:?})", self.field, self.message, self.value)
    }
}

impl ParseWarning {
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let warning = Self {
            field: field.into(),
            value: value.into(),
            message: message.into(),
        };
        tracing::warn!(field = %warning.field, value = %warning.value, "{}", warning.message);
        warning
    }
}

/// A parsed value together with the warnings collected while parsing it.
#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub value: T,
    pub warnings: Vec<ParseWarning>,
}
