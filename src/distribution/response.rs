use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};

use crate::core::parse::{timestamp, trimmed};
use crate::core::{Environment, Nsu, ParseWarning, SefazError};
use crate::soap;

use super::decode::decode_document;

/// `cStat` 137: nothing new for the interested party.
pub const NO_DOCUMENTS: u16 = 137;
/// `cStat` 138: at least one document returned.
pub const DOCUMENTS_FOUND: u16 = 138;
/// `cStat` 656: too many requests; wait before asking again.
pub const RATE_LIMITED: u16 = 656;

/// Schema prefix of full authorized NF-e documents.
pub const NFE_PROC_SCHEMA_PREFIX: &str = "procNFe";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    NoDocuments,
    DocumentsFound,
    RateLimited,
    /// Any other `cStat`, including rejections.
    Other(u16),
}

impl BatchStatus {
    pub fn from_code(code: u16) -> Self {
        match code {
            NO_DOCUMENTS => Self::NoDocuments,
            DOCUMENTS_FOUND => Self::DocumentsFound,
            RATE_LIMITED => Self::RateLimited,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Self::NoDocuments => NO_DOCUMENTS,
            Self::DocumentsFound => DOCUMENTS_FOUND,
            Self::RateLimited => RATE_LIMITED,
            Self::Other(code) => *code,
        }
    }
}

/// One `docZip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub nsu: Nsu,
    /// Schema identifier, e.g. `procNFe_v4.00.xsd` or `resNFe_v1.01.xsd`.
    pub schema: String,
    /// base64(gzip(xml)).
    pub payload: String,
}

impl DocumentRecord {
    /// Whether this record holds a full `nfeProc` that can be mapped.
    pub fn is_nfe_proc(&self) -> bool {
        self.schema.starts_with(NFE_PROC_SCHEMA_PREFIX)
    }

    /// Decoded XML bytes.
    pub fn decode(&self) -> Result<Vec<u8>, SefazError> {
        decode_document(self.nsu, &self.payload)
    }
}

/// Interpreted `retDistDFeInt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionBatch {
    pub environment_code: u8,
    pub app_version: String,
    pub status_code: u16,
    pub reason: String,
    /// `dhResp`.
    pub responded_at: Option<DateTime<FixedOffset>>,
    /// `ultNSU`: cursor for the next `distNSU` request.
    pub last_nsu: Nsu,
    /// `maxNSU`: highest NSU currently available.
    pub max_nsu: Nsu,
    /// In delivery order.
    pub records: Vec<DocumentRecord>,
    #[serde(skip)]
    pub warnings: Vec<ParseWarning>,
}

impl DistributionBatch {
    pub fn status(&self) -> BatchStatus {
        BatchStatus::from_code(self.status_code)
    }

    pub fn environment(&self) -> Option<Environment> {
        Environment::from_code(self.environment_code)
    }

    /// More documents are waiting past `last_nsu`.
    pub fn has_more(&self) -> bool {
        self.last_nsu < self.max_nsu
    }

    fn check_sequence(&self) -> Result<(), SefazError> {
        let mut previous = Nsu::ZERO;
        for record in &self.records {
            if record.nsu < previous {
                return Err(SefazError::Protocol(format!(
                    "docZip NSU {} delivered after {previous}",
                    record.nsu
                )));
            }
            if record.nsu > self.last_nsu {
                return Err(SefazError::Protocol(format!(
                    "docZip NSU {} is beyond ultNSU {}",
                    record.nsu, self.last_nsu
                )));
            }
            previous = record.nsu;
        }
        Ok(())
    }
}

#[derive(Default)]
struct RetDistParsed {
    tp_amb: Option<String>,
    ver_aplic: Option<String>,
    c_stat: Option<String>,
    x_motivo: Option<String>,
    dh_resp: Option<String>,
    ult_nsu: Option<String>,
    max_nsu: Option<String>,
    records: Vec<DocumentRecord>,
    current: Option<DocumentRecord>,
}

impl RetDistParsed {
    fn handle_text(&mut self, path: &[String], text: &str) {
        match path {
            [_, leaf] => {
                let text = Some(text.to_string());
                match leaf.as_str() {
                    "tpAmb" => self.tp_amb = text,
                    "verAplic" => self.ver_aplic = text,
                    "cStat" => self.c_stat = text,
                    "xMotivo" => self.x_motivo = text,
                    "dhResp" => self.dh_resp = text,
                    "ultNSU" => self.ult_nsu = text,
                    "maxNSU" => self.max_nsu = text,
                    _ => {}
                }
            }
            [_, lote, doc] if lote == "loteDistDFeInt" && doc == "docZip" => {
                if let Some(record) = self.current.as_mut() {
                    record.payload.push_str(text);
                }
            }
            _ => {}
        }
    }

    fn start_doc_zip(&mut self, e: &BytesStart<'_>) -> Result<(), SefazError> {
        let mut nsu = None;
        let mut schema = String::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| SefazError::Xml(format!("malformed docZip attribute: {e}")))?;
            let value = attr
                .unescape_value()
                .map_err(|e| SefazError::Xml(format!("invalid docZip attribute: {e}")))?;
            match attr.key.as_ref() {
                b"NSU" => nsu = Some(Nsu::from_str(value.trim())?),
                b"schema" => schema = value.trim().to_string(),
                _ => {}
            }
        }
        let nsu = nsu.ok_or_else(|| SefazError::Protocol("docZip without NSU attribute".into()))?;
        self.current = Some(DocumentRecord {
            nsu,
            schema,
            payload: String::new(),
        });
        Ok(())
    }

    fn into_batch(self) -> Result<DistributionBatch, SefazError> {
        let mut warnings = Vec::new();
        let batch = DistributionBatch {
            environment_code: protocol_number("tpAmb", self.tp_amb.as_deref())?,
            app_version: trimmed(self.ver_aplic.as_deref()),
            status_code: protocol_number("cStat", self.c_stat.as_deref())?,
            reason: trimmed(self.x_motivo.as_deref()),
            responded_at: timestamp("retDistDFeInt.dhResp", self.dh_resp.as_deref(), &mut warnings),
            last_nsu: nsu_field(self.ult_nsu.as_deref())?,
            max_nsu: nsu_field(self.max_nsu.as_deref())?,
            records: self.records,
            warnings,
        };
        batch.check_sequence()?;
        Ok(batch)
    }
}

fn protocol_number<T>(field: &str, raw: Option<&str>) -> Result<T, SefazError>
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(T::default()),
        Some(s) => s
            .parse()
            .map_err(|e| SefazError::Protocol(format!("retDistDFeInt.{field} '{s}': {e}"))),
    }
}

fn nsu_field(raw: Option<&str>) -> Result<Nsu, SefazError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Nsu::ZERO),
        Some(s) => Nsu::from_str(s),
    }
}

/// Extract `retDistDFeInt` from a response body and interpret it.
pub fn parse_distribution_response(body: &[u8]) -> Result<DistributionBatch, SefazError> {
    let element = soap::extract_element(body, "retDistDFeInt")?;
    let xml = std::str::from_utf8(element)
        .map_err(|e| SefazError::Protocol(format!("retDistDFeInt is not UTF-8: {e}")))?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = RetDistParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "docZip" {
                    p.start_doc_zip(e)?;
                }
                path.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"docZip" {
                    p.start_doc_zip(e)?;
                    if let Some(record) = p.current.take() {
                        p.records.push(record);
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| SefazError::Xml(format!("invalid text in retDistDFeInt: {e}")))?;
                if !text.is_empty() {
                    p.handle_text(&path, &text);
                }
            }
            Ok(Event::End(_)) => {
                if path.pop().as_deref() == Some("docZip") {
                    if let Some(record) = p.current.take() {
                        p.records.push(record);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SefazError::Xml(format!(
                    "malformed retDistDFeInt at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    let batch = p.into_batch()?;
    tracing::info!(
        status = batch.status_code,
        last_nsu = %batch.last_nsu,
        max_nsu = %batch.max_nsu,
        documents = batch.records.len(),
        "parsed distribution batch"
    );
    Ok(batch)
}
