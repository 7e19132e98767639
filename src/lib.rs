//! # sefaz
//!
//! Client-side protocol layer for the Brazilian NF-e web services: DF-e
//! distribution with NSU pagination and semantic mapping of `nfeProc`
//! documents, and event submission with enveloped XML-DSig signatures
//! (C14N 1.0, RSA-SHA1) over SOAP.
//!
//! Monetary values use [`rust_decimal::Decimal`], never floating point.
//! HTTP and key loading sit behind the [`core::Transport`] and
//! [`xmldsig::CredentialProvider`] traits; a `reqwest` transport and a PEM
//! loader ship as defaults.
//!
//! ## Quick Start
//!
//! ```rust
//! use sefaz::core::{DocumentKey, Environment, SefazError, ServiceConfig, SoapRequest, TaxpayerId};
//! use sefaz::distribution::DistributionQuery;
//! use sefaz::SefazClient;
//!
//! let reply = r#"<retDistDFeInt versao="1.01" xmlns="http://www.portalfiscal.inf.br/nfe">
//!   <tpAmb>2</tpAmb><verAplic>1.4.0</verAplic><cStat>137</cStat>
//!   <xMotivo>Nenhum documento localizado</xMotivo>
//!   <ultNSU>000000000000000</ultNSU><maxNSU>000000000000000</maxNSU>
//! </retDistDFeInt>"#;
//! let transport = move |_: &SoapRequest<'_>| -> Result<Vec<u8>, SefazError> {
//!     Ok(reply.as_bytes().to_vec())
//! };
//!
//! let client = SefazClient::new(ServiceConfig::homologation(), transport);
//! let query = DistributionQuery::by_key(
//!     TaxpayerId::cnpj("98.765.432/0001-01")?,
//!     Environment::Homologation,
//!     DocumentKey::parse("35240512345678000195550010000001231000000016")?,
//! );
//! let result = client.distribute(&query)?;
//! assert!(result.documents.is_empty());
//! # Ok::<(), SefazError>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Identifiers, configuration, errors, transport trait, XML tree and C14N |
//! | `distribution` (default) | `distDFeInt` / `retDistDFeInt`, docZip decoding, `nfeProc` mapping |
//! | `xmldsig` | Enveloped RSA-SHA1 signatures, PEM credentials |
//! | `events` (default) | `envEvento` construction and signing, `retEnvEvento` interpretation |
//! | `http` | Blocking `reqwest` transport with client certificates |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod xml;

#[cfg(feature = "core")]
pub mod soap;

#[cfg(feature = "xmldsig")]
pub mod xmldsig;

#[cfg(feature = "events")]
pub mod events;

#[cfg(feature = "distribution")]
pub mod distribution;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "core")]
mod client;

#[cfg(feature = "core")]
pub use client::SefazClient;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
