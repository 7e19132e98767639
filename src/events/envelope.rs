//! `envEvento` construction.
//!
//! The builder moves through `Empty → Building → SealedEnvelope`; every
//! transition consumes it, so a failed push leaves nothing half-built
//! behind and a sealed envelope cannot be extended.

use std::collections::HashSet;
use std::marker::PhantomData;

use crate::core::{NFE_NAMESPACE, SefazError, ServiceConfig};
use crate::xml::{Element, NamespaceScope};
use crate::xmldsig::{DigestedSubtree, SignatureBlock, SigningCredential};

use super::request::{EVENT_VERSION, FiscalEventRequest, MAX_EVENTS_PER_BATCH};

/// Largest `idLote` the schema accepts (15 digits).
pub const MAX_BATCH_ID: u64 = 999_999_999_999_999;

/// Builder state: no event yet.
#[derive(Debug)]
pub struct Empty;

/// Builder state: at least one signed event.
#[derive(Debug)]
pub struct Building;

/// A signed `evento`. Immutable once created.
#[derive(Debug, Clone)]
pub struct SignedEventRecord {
    request: FiscalEventRequest,
    signature: SignatureBlock,
    element: Element,
}

impl SignedEventRecord {
    pub fn request(&self) -> &FiscalEventRequest {
        &self.request
    }

    pub fn signature(&self) -> &SignatureBlock {
        &self.signature
    }

    /// The `evento` element: `infEvento` followed by its `Signature`.
    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn event_id(&self) -> String {
        self.request.event_id()
    }
}

#[derive(Debug)]
pub struct EventBatchBuilder<S> {
    batch_id: u64,
    namespace: String,
    version: String,
    records: Vec<SignedEventRecord>,
    _state: PhantomData<S>,
}

impl EventBatchBuilder<Empty> {
    /// Builder using the NF-e namespace and version `1.00`.
    pub fn new(batch_id: u64) -> Self {
        Self::with_schema(batch_id, NFE_NAMESPACE, EVENT_VERSION)
    }

    pub fn from_config(batch_id: u64, config: &ServiceConfig) -> Self {
        Self::with_schema(batch_id, &config.nfe_namespace, &config.event_version)
    }

    fn with_schema(batch_id: u64, namespace: &str, version: &str) -> Self {
        Self {
            batch_id,
            namespace: namespace.to_string(),
            version: version.to_string(),
            records: Vec::new(),
            _state: PhantomData,
        }
    }

    /// Sign the first event.
    pub fn push(
        self,
        request: FiscalEventRequest,
        credential: &SigningCredential,
    ) -> Result<EventBatchBuilder<Building>, SefazError> {
        if self.batch_id > MAX_BATCH_ID {
            return Err(SefazError::Validation(format!(
                "idLote {} exceeds 15 digits",
                self.batch_id
            )));
        }
        self.append(request, credential)
    }
}

impl EventBatchBuilder<Building> {
    /// Sign one more event.
    pub fn push(
        self,
        request: FiscalEventRequest,
        credential: &SigningCredential,
    ) -> Result<Self, SefazError> {
        self.append(request, credential)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Close the batch.
    pub fn seal(self) -> Result<SealedEnvelope, SefazError> {
        let mut root = Element::new("envEvento")
            .attr("versao", self.version.as_str())
            .attr("xmlns", self.namespace.as_str())
            .text_child("idLote", self.batch_id.to_string());
        for record in &self.records {
            root.push(record.element.clone());
        }
        let bytes = root.to_xml()?.into_bytes();
        tracing::info!(
            batch_id = self.batch_id,
            events = self.records.len(),
            bytes = bytes.len(),
            "sealed event envelope"
        );
        Ok(SealedEnvelope {
            batch_id: self.batch_id,
            element: root,
            records: self.records,
            bytes,
        })
    }
}

impl<S> EventBatchBuilder<S> {
    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    fn append(
        mut self,
        request: FiscalEventRequest,
        credential: &SigningCredential,
    ) -> Result<EventBatchBuilder<Building>, SefazError> {
        if self.records.len() >= MAX_EVENTS_PER_BATCH {
            return Err(SefazError::Validation(format!(
                "an envEvento holds at most {MAX_EVENTS_PER_BATCH} events"
            )));
        }
        request.validate()?;
        if self
            .records
            .iter()
            .any(|r| r.request.identity() == request.identity())
        {
            return Err(SefazError::Validation(format!(
                "duplicate event {} in batch {}",
                request.event_id(),
                self.batch_id
            )));
        }

        let record = self.sign(request, credential)?;
        tracing::debug!(id = %record.event_id(), "signed event");
        self.records.push(record);
        Ok(EventBatchBuilder {
            batch_id: self.batch_id,
            namespace: self.namespace,
            version: self.version,
            records: self.records,
            _state: PhantomData,
        })
    }

    fn sign(
        &self,
        request: FiscalEventRequest,
        credential: &SigningCredential,
    ) -> Result<SignedEventRecord, SefazError> {
        // envEvento and evento both bind only the default namespace, which is
        // all infEvento inherits.
        let scope = NamespaceScope::new().with_namespace("", self.namespace.as_str());
        let (info, signature) =
            DigestedSubtree::new(request.info_element(), scope)?.seal(credential)?;
        let element = Element::new("evento")
            .attr("versao", self.version.as_str())
            .attr("xmlns", self.namespace.as_str())
            .child(info)
            .child(signature.to_element());
        Ok(SignedEventRecord {
            request,
            signature,
            element,
        })
    }
}

/// A finished `envEvento`.
#[derive(Debug, Clone)]
pub struct SealedEnvelope {
    batch_id: u64,
    element: Element,
    records: Vec<SignedEventRecord>,
    bytes: Vec<u8>,
}

impl SealedEnvelope {
    pub fn batch_id(&self) -> u64 {
        self.batch_id
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn records(&self) -> &[SignedEventRecord] {
        &self.records
    }

    /// Serialized `envEvento`, without XML declaration.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DocumentKey, Environment, TaxpayerId};
    use crate::events::ManifestationKind;
    use chrono::{FixedOffset, TimeZone};

    const CERT: &[u8] = include_bytes!("../../tests/fixtures/signer_cert.pem");
    const KEY: &[u8] = include_bytes!("../../tests/fixtures/signer_key.pem");

    fn request(kind: ManifestationKind) -> FiscalEventRequest {
        FiscalEventRequest::manifestation(
            kind,
            Environment::Homologation,
            TaxpayerId::cnpj("12345678000195").unwrap(),
            DocumentKey::parse("35240512345678000195550010000001231000000016").unwrap(),
            FixedOffset::west_opt(3 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 5, 10, 14, 30, 0)
                .unwrap(),
        )
    }

    #[test]
    fn envelope_layout() {
        let cred = SigningCredential::from_pem(CERT, KEY).unwrap();
        let sealed = EventBatchBuilder::new(7)
            .push(request(ManifestationKind::Awareness), &cred)
            .unwrap()
            .seal()
            .unwrap();
        let root = sealed.element();
        assert_eq!(root.attribute("versao"), Some("1.00"));
        assert_eq!(root.find("idLote").unwrap().text_content(), "7");
        let evento = root.find("evento").unwrap();
        let names: Vec<_> = evento.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["infEvento", "Signature"]);
        assert!(sealed.as_bytes().starts_with(b"<envEvento"));
    }

    #[test]
    fn twenty_first_event_is_rejected() {
        let cred = SigningCredential::from_pem(CERT, KEY).unwrap();
        let mut builder = EventBatchBuilder::new(1)
            .push(request(ManifestationKind::Awareness), &cred)
            .unwrap();
        for seq in 2..=20 {
            builder = builder
                .push(request(ManifestationKind::Awareness).with_sequence(seq), &cred)
                .unwrap();
        }
        assert_eq!(builder.len(), 20);
        let err = builder
            .push(request(ManifestationKind::Awareness).with_sequence(21), &cred)
            .unwrap_err();
        assert!(matches!(err, SefazError::Validation(_)));
    }

    #[test]
    fn oversized_batch_id_is_rejected() {
        let cred = SigningCredential::from_pem(CERT, KEY).unwrap();
        assert!(
            EventBatchBuilder::new(MAX_BATCH_ID + 1)
                .push(request(ManifestationKind::Awareness), &cred)
                .is_err()
        );
    }
}
