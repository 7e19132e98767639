//! DF-e distribution (`NFeDistribuicaoDFe`).
//!
//! A request selects documents by key or by NSU; the response carries an
//! NSU cursor and a batch of `docZip` records. Each record is decoded
//! (base64, then gzip) and full `nfeProc` documents are mapped into a
//! [`FiscalDocument`]. Summaries, events and everything else come back as
//! raw XML.
//!
//! ```no_run
//! use sefaz::core::{Environment, Nsu, ServiceConfig, SoapRequest, SefazError, TaxpayerId};
//! use sefaz::distribution::{DistributionQuery, fetch};
//!
//! let config = ServiceConfig::production();
//! let transport = |req: &SoapRequest<'_>| -> Result<Vec<u8>, SefazError> {
//!     unimplemented!("send {} bytes to {}", req.payload.len(), req.url)
//! };
//! let query = DistributionQuery::after_nsu(
//!     TaxpayerId::cnpj("12.345.678/0001-95")?,
//!     Environment::Production,
//!     35,
//!     Nsu::ZERO,
//! );
//! let result = fetch(&transport, &config, &query, &[])?;
//! println!("next cursor: {}", result.last_nsu);
//! # Ok::<(), SefazError>(())
//! ```

mod decode;
mod mapper;
mod model;
mod query;
mod response;

pub use decode::{MAX_DOCUMENT_BYTES, decode_document, encode_document};
pub use mapper::map_nfe_proc;
pub use model::*;
pub use query::{DistributionQuery, Selector};
pub use response::{
    BatchStatus, DOCUMENTS_FOUND, DistributionBatch, DocumentRecord, NFE_PROC_SCHEMA_PREFIX,
    NO_DOCUMENTS, RATE_LIMITED, parse_distribution_response,
};

use chrono::{DateTime, FixedOffset};

use crate::core::{Nsu, ParseWarning, SefazError, ServiceConfig, SoapRequest, Transport};
use crate::soap;

/// One delivered document after decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributedDocument {
    /// A mapped `procNFe` record.
    Fiscal(Box<FiscalDocument>),
    /// Any other schema, as decoded XML.
    Raw {
        nsu: Nsu,
        schema: String,
        xml: Vec<u8>,
    },
}

impl DistributedDocument {
    pub fn nsu(&self) -> Nsu {
        match self {
            Self::Fiscal(doc) => doc.nsu,
            Self::Raw { nsu, .. } => *nsu,
        }
    }

    pub fn schema(&self) -> &str {
        match self {
            Self::Fiscal(doc) => &doc.schema,
            Self::Raw { schema, .. } => schema,
        }
    }
}

/// Outcome of one distribution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionResult {
    pub environment_code: u8,
    pub app_version: String,
    pub status_code: u16,
    pub reason: String,
    pub responded_at: Option<DateTime<FixedOffset>>,
    pub last_nsu: Nsu,
    pub max_nsu: Nsu,
    /// In delivery order.
    pub documents: Vec<DistributedDocument>,
    /// Response and mapping warnings together.
    pub warnings: Vec<ParseWarning>,
}

impl DistributionResult {
    pub fn status(&self) -> BatchStatus {
        BatchStatus::from_code(self.status_code)
    }

    pub fn has_more(&self) -> bool {
        self.last_nsu < self.max_nsu
    }

    /// Mapped documents only.
    pub fn fiscal_documents(&self) -> impl Iterator<Item = &FiscalDocument> {
        self.documents.iter().filter_map(|d| match d {
            DistributedDocument::Fiscal(doc) => Some(doc.as_ref()),
            DistributedDocument::Raw { .. } => None,
        })
    }
}

/// Decode every record of a batch, mapping `procNFe` ones.
///
/// Stops at the first record that fails to decode or map.
pub fn decode_batch(batch: DistributionBatch) -> Result<DistributionResult, SefazError> {
    let DistributionBatch {
        environment_code,
        app_version,
        status_code,
        reason,
        responded_at,
        last_nsu,
        max_nsu,
        records,
        mut warnings,
    } = batch;

    let mut documents = Vec::with_capacity(records.len());
    for record in records {
        let xml = record.decode()?;
        if record.is_nfe_proc() {
            let parsed = map_nfe_proc(record.nsu, &record.schema, &xml)?;
            warnings.extend(parsed.warnings);
            documents.push(DistributedDocument::Fiscal(Box::new(parsed.value)));
        } else {
            documents.push(DistributedDocument::Raw {
                nsu: record.nsu,
                schema: record.schema,
                xml,
            });
        }
    }

    Ok(DistributionResult {
        environment_code,
        app_version,
        status_code,
        reason,
        responded_at,
        last_nsu,
        max_nsu,
        documents,
        warnings,
    })
}

/// Run one distribution request end to end.
///
/// `headers` are handed to the transport with the request.
pub fn fetch<T: Transport + ?Sized>(
    transport: &T,
    config: &ServiceConfig,
    query: &DistributionQuery,
    headers: &[(String, String)],
) -> Result<DistributionResult, SefazError> {
    let endpoint = &config.distribution;
    let payload = soap::envelope(&query.payload(config)?, endpoint)?;
    tracing::debug!(
        url = %endpoint.url,
        selector = ?query.selector,
        bytes = payload.len(),
        "sending distribution request"
    );
    let body = transport.send(&SoapRequest::new(&payload, endpoint).with_headers(headers))?;
    tracing::debug!(bytes = body.len(), "received distribution response");
    decode_batch(parse_distribution_response(&body)?)
}
