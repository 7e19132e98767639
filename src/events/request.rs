use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::core::{DocumentKey, Environment, SefazError, TaxpayerId};
use crate::xml::Element;

/// `cOrgao` of the national environment, used by recipient manifestation.
pub const NATIONAL_AUTHORITY: u8 = 91;

/// Default `versao` of `evento` and `detEvento`.
pub const EVENT_VERSION: &str = "1.00";

/// Maximum number of `evento`s in one `envEvento`.
pub const MAX_EVENTS_PER_BATCH: usize = 20;

/// Recipient manifestation events (Manifestação do Destinatário).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManifestationKind {
    /// 210200
    Confirmation,
    /// 210210
    Awareness,
    /// 210220
    Unknown,
    /// 210240, requires a justification.
    NotPerformed,
}

impl ManifestationKind {
    pub const ALL: [ManifestationKind; 4] = [
        Self::Confirmation,
        Self::Awareness,
        Self::Unknown,
        Self::NotPerformed,
    ];

    /// `tpEvento` code.
    pub fn code(&self) -> u32 {
        match self {
            Self::Confirmation => 210200,
            Self::Awareness => 210210,
            Self::Unknown => 210220,
            Self::NotPerformed => 210240,
        }
    }

    /// `descEvento` text expected by the authority.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Confirmation => "Confirmacao da Operacao",
            Self::Awareness => "Ciencia da Operacao",
            Self::Unknown => "Desconhecimento da Operacao",
            Self::NotPerformed => "Operacao nao Realizada",
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    pub fn requires_justification(&self) -> bool {
        matches!(self, Self::NotPerformed)
    }
}

impl fmt::Display for ManifestationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// One event to be signed and submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalEventRequest {
    /// `cOrgao`: IBGE code of the receiving authority (91 for the national one).
    pub authority_code: u8,
    pub environment: Environment,
    /// Event author.
    pub author: TaxpayerId,
    pub key: DocumentKey,
    /// `dhEvento`.
    pub timestamp: DateTime<FixedOffset>,
    /// Six-digit `tpEvento`.
    pub event_type: u32,
    /// `nSeqEvento`, 1 to 99.
    pub sequence: u8,
    /// `versao` of the event detail.
    pub version: String,
    /// `descEvento`.
    pub description: String,
    /// `xJust`.
    pub justification: Option<String>,
}

impl FiscalEventRequest {
    /// A recipient manifestation with the catalogued description, `cOrgao`
    /// 91 and sequence 1.
    pub fn manifestation(
        kind: ManifestationKind,
        environment: Environment,
        author: TaxpayerId,
        key: DocumentKey,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            authority_code: NATIONAL_AUTHORITY,
            environment,
            author,
            key,
            timestamp,
            event_type: kind.code(),
            sequence: 1,
            version: EVENT_VERSION.to_string(),
            description: kind.description().to_string(),
            justification: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u8) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = Some(justification.into());
        self
    }

    /// `"ID" + tpEvento + chNFe + nSeqEvento` (two digits).
    pub fn event_id(&self) -> String {
        format!("ID{}{}{:02}", self.event_type, self.key, self.sequence)
    }

    /// Triple that must be unique within a batch.
    pub fn identity(&self) -> (u32, &DocumentKey, u8) {
        (self.event_type, &self.key, self.sequence)
    }

    pub fn manifestation_kind(&self) -> Option<ManifestationKind> {
        ManifestationKind::from_code(self.event_type)
    }

    /// Schema rules checked before anything is signed.
    pub fn validate(&self) -> Result<(), SefazError> {
        let fail = |msg: String| Err(SefazError::Validation(format!("{}: {msg}", self.event_id())));

        if !(10..=99).contains(&self.authority_code) {
            return fail(format!("cOrgao must have two digits, got {}", self.authority_code));
        }
        if !(100_000..=999_999).contains(&self.event_type) {
            return fail(format!("tpEvento must have six digits, got {}", self.event_type));
        }
        if !(1..=99).contains(&self.sequence) {
            return fail(format!("nSeqEvento must be 1..=99, got {}", self.sequence));
        }
        if self.version.trim().is_empty() {
            return fail("event version is empty".into());
        }
        if self.description.trim().is_empty() {
            return fail("descEvento is empty".into());
        }
        if let Some(kind) = self.manifestation_kind() {
            if self.description != kind.description() {
                return fail(format!(
                    "descEvento for {} must be '{}'",
                    kind.code(),
                    kind.description()
                ));
            }
            if kind.requires_justification() && self.justification.is_none() {
                return fail(format!("{kind} requires xJust"));
            }
        }
        if let Some(just) = &self.justification {
            let len = just.trim().chars().count();
            if !(15..=255).contains(&len) {
                return fail(format!("xJust must have 15..=255 characters, got {len}"));
            }
        }
        Ok(())
    }

    /// The unsigned `infEvento` element.
    pub fn info_element(&self) -> Element {
        let mut detail = Element::new("detEvento")
            .attr("versao", self.version.as_str())
            .text_child("descEvento", self.description.as_str());
        if let Some(just) = &self.justification {
            detail.push(Element::new("xJust").text(just.trim()));
        }

        Element::new("infEvento")
            .attr("Id", self.event_id())
            .text_child("cOrgao", format!("{:02}", self.authority_code))
            .text_child("tpAmb", self.environment.code().to_string())
            .text_child(self.author.tag(), self.author.digits())
            .text_child("chNFe", self.key.as_str())
            .text_child(
                "dhEvento",
                self.timestamp.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
            )
            .text_child("tpEvento", self.event_type.to_string())
            .text_child("nSeqEvento", self.sequence.to_string())
            .text_child("verEvento", self.version.as_str())
            .child(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(kind: ManifestationKind) -> FiscalEventRequest {
        FiscalEventRequest::manifestation(
            kind,
            Environment::Homologation,
            TaxpayerId::cnpj("12.345.678/0001-95").unwrap(),
            DocumentKey::parse("35240512345678000195550010000001231000000016").unwrap(),
            FixedOffset::west_opt(3 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 5, 10, 14, 30, 0)
                .unwrap(),
        )
    }

    #[test]
    fn id_concatenates_type_key_and_sequence() {
        let req = request(ManifestationKind::Confirmation).with_sequence(3);
        assert_eq!(
            req.event_id(),
            "ID2102003524051234567800019555001000000123100000001603"
        );
    }

    #[test]
    fn info_fields_in_schema_order() {
        let info = request(ManifestationKind::Awareness).info_element();
        let names: Vec<_> = info.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "cOrgao", "tpAmb", "CNPJ", "chNFe", "dhEvento", "tpEvento", "nSeqEvento",
                "verEvento", "detEvento"
            ]
        );
        assert_eq!(
            info.find("dhEvento").unwrap().text_content(),
            "2024-05-10T14:30:00-03:00"
        );
        assert_eq!(info.find("cOrgao").unwrap().text_content(), "91");
    }

    #[test]
    fn not_performed_needs_justification() {
        let req = request(ManifestationKind::NotPerformed);
        assert!(matches!(req.validate(), Err(SefazError::Validation(_))));
        let req = req.with_justification("short");
        assert!(req.validate().is_err());
        let req = request(ManifestationKind::NotPerformed)
            .with_justification("Mercadoria nao foi entregue ao destinatario");
        req.validate().unwrap();
        let detail = req.info_element();
        assert!(detail.find("detEvento").unwrap().find("xJust").is_some());
    }

    #[test]
    fn sequence_out_of_range() {
        assert!(request(ManifestationKind::Awareness).with_sequence(0).validate().is_err());
        assert!(request(ManifestationKind::Awareness).with_sequence(100).validate().is_err());
    }

    #[test]
    fn catalog_codes() {
        assert_eq!(
            ManifestationKind::from_code(210240),
            Some(ManifestationKind::NotPerformed)
        );
        assert_eq!(ManifestationKind::from_code(110111), None);
    }
}
