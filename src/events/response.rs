use chrono::{DateTime, FixedOffset};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use crate::core::parse::{clean, lenient_integer, timestamp, trimmed};
use crate::core::{Environment, ParseWarning, SefazError, TaxpayerId};

/// `cStat` of a processed batch.
pub const BATCH_PROCESSED: u16 = 128;
/// `cStat` of an event registered and linked to the NF-e.
pub const EVENT_REGISTERED: u16 = 135;
/// `cStat` of an event registered without a linked NF-e.
pub const EVENT_REGISTERED_UNLINKED: u16 = 136;
/// `cStat` of a duplicate event.
pub const EVENT_DUPLICATE: u16 = 573;

/// Interpreted `retEnvEvento`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatchResult {
    pub batch_id: u64,
    pub environment_code: u8,
    pub app_version: String,
    pub authority_code: u8,
    pub status_code: u16,
    pub reason: String,
    pub results: Vec<EventResult>,
    #[serde(skip)]
    pub warnings: Vec<ParseWarning>,
}

impl EventBatchResult {
    /// The batch was accepted for processing; look at each result.
    pub fn is_processed(&self) -> bool {
        self.status_code == BATCH_PROCESSED
    }

    pub fn environment(&self) -> Option<Environment> {
        Environment::from_code(self.environment_code)
    }

    /// Result for one event, by key, type and sequence.
    pub fn result_for(&self, key: &str, event_type: u32, sequence: u8) -> Option<&EventResult> {
        self.results
            .iter()
            .find(|r| r.key == key && r.event_type == event_type && r.sequence == sequence)
    }
}

/// One `retEvento/infEvento`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResult {
    pub environment_code: u8,
    pub app_version: String,
    pub authority_code: u8,
    pub status_code: u16,
    pub reason: String,
    /// `chNFe` as returned; not validated.
    pub key: String,
    pub event_type: u32,
    /// `xEvento`.
    pub event_description: Option<String>,
    pub sequence: u8,
    /// `dhRegEvento`.
    pub registered_at: Option<DateTime<FixedOffset>>,
    /// `nProt`.
    pub protocol: Option<String>,
    /// `CNPJDest` / `CPFDest`.
    pub recipient: Option<TaxpayerId>,
    pub recipient_email: Option<String>,
}

impl EventResult {
    pub fn is_registered(&self) -> bool {
        matches!(
            self.status_code,
            EVENT_REGISTERED | EVENT_REGISTERED_UNLINKED
        )
    }

    pub fn is_duplicate(&self) -> bool {
        self.status_code == EVENT_DUPLICATE
    }
}

#[derive(Default)]
struct RawHeader {
    batch_id: Option<String>,
    tp_amb: Option<String>,
    ver_aplic: Option<String>,
    c_orgao: Option<String>,
    c_stat: Option<String>,
    x_motivo: Option<String>,
}

#[derive(Default)]
struct RawEvent {
    tp_amb: Option<String>,
    ver_aplic: Option<String>,
    c_orgao: Option<String>,
    c_stat: Option<String>,
    x_motivo: Option<String>,
    ch_nfe: Option<String>,
    tp_evento: Option<String>,
    x_evento: Option<String>,
    n_seq_evento: Option<String>,
    dh_reg_evento: Option<String>,
    n_prot: Option<String>,
    cnpj_dest: Option<String>,
    cpf_dest: Option<String>,
    email_dest: Option<String>,
}

#[derive(Default)]
struct RetEnvEventoParsed {
    header: RawHeader,
    events: Vec<RawEvent>,
    current: Option<RawEvent>,
}

impl RetEnvEventoParsed {
    /// `path` is relative to `retEnvEvento`.
    fn handle_text(&mut self, path: &[String], text: &str) {
        let text = Some(text.to_string());
        match path {
            [leaf] => {
                let h = &mut self.header;
                match leaf.as_str() {
                    "idLote" => h.batch_id = text,
                    "tpAmb" => h.tp_amb = text,
                    "verAplic" => h.ver_aplic = text,
                    "cOrgao" => h.c_orgao = text,
                    "cStat" => h.c_stat = text,
                    "xMotivo" => h.x_motivo = text,
                    _ => {}
                }
            }
            [ret, info, leaf] if ret == "retEvento" && info == "infEvento" => {
                let Some(ev) = self.current.as_mut() else {
                    return;
                };
                match leaf.as_str() {
                    "tpAmb" => ev.tp_amb = text,
                    "verAplic" => ev.ver_aplic = text,
                    "cOrgao" => ev.c_orgao = text,
                    "cStat" => ev.c_stat = text,
                    "xMotivo" => ev.x_motivo = text,
                    "chNFe" => ev.ch_nfe = text,
                    "tpEvento" => ev.tp_evento = text,
                    "xEvento" => ev.x_evento = text,
                    "nSeqEvento" => ev.n_seq_evento = text,
                    "dhRegEvento" => ev.dh_reg_evento = text,
                    "nProt" => ev.n_prot = text,
                    "CNPJDest" => ev.cnpj_dest = text,
                    "CPFDest" => ev.cpf_dest = text,
                    "emailDest" => ev.email_dest = text,
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn into_result(self) -> EventBatchResult {
        let mut warnings = Vec::new();
        let h = self.header;
        let w = &mut warnings;
        let results = self
            .events
            .into_iter()
            .map(|ev| event_result(ev, w))
            .collect();
        EventBatchResult {
            batch_id: lenient_integer("retEnvEvento.idLote", h.batch_id.as_deref(), w),
            environment_code: lenient_integer("retEnvEvento.tpAmb", h.tp_amb.as_deref(), w),
            app_version: trimmed(h.ver_aplic.as_deref()),
            authority_code: lenient_integer("retEnvEvento.cOrgao", h.c_orgao.as_deref(), w),
            status_code: lenient_integer("retEnvEvento.cStat", h.c_stat.as_deref(), w),
            reason: trimmed(h.x_motivo.as_deref()),
            results,
            warnings,
        }
    }
}

fn event_result(ev: RawEvent, w: &mut Vec<ParseWarning>) -> EventResult {
    let recipient = clean(ev.cnpj_dest.as_deref())
        .map(TaxpayerId::Cnpj)
        .or_else(|| clean(ev.cpf_dest.as_deref()).map(TaxpayerId::Cpf));
    EventResult {
        environment_code: lenient_integer("infEvento.tpAmb", ev.tp_amb.as_deref(), w),
        app_version: trimmed(ev.ver_aplic.as_deref()),
        authority_code: lenient_integer("infEvento.cOrgao", ev.c_orgao.as_deref(), w),
        status_code: lenient_integer("infEvento.cStat", ev.c_stat.as_deref(), w),
        reason: trimmed(ev.x_motivo.as_deref()),
        key: trimmed(ev.ch_nfe.as_deref()),
        event_type: lenient_integer("infEvento.tpEvento", ev.tp_evento.as_deref(), w),
        event_description: clean(ev.x_evento.as_deref()),
        sequence: lenient_integer("infEvento.nSeqEvento", ev.n_seq_evento.as_deref(), w),
        registered_at: timestamp("infEvento.dhRegEvento", ev.dh_reg_evento.as_deref(), w),
        protocol: clean(ev.n_prot.as_deref()),
        recipient,
        recipient_email: clean(ev.email_dest.as_deref()),
    }
}

/// Find `retEnvEvento` (under any prefix or wrapper) in a response body and
/// interpret it.
pub fn parse_event_response(body: &[u8]) -> Result<EventBatchResult, SefazError> {
    let xml = std::str::from_utf8(body)
        .map_err(|e| SefazError::Protocol(format!("event response is not UTF-8: {e}")))?;
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = RetEnvEventoParsed::default();
    let mut path: Vec<String> = Vec::new();
    let mut inside = false;
    let mut closed = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if !inside {
                    inside = local == "retEnvEvento";
                    continue;
                }
                if path.len() == 1 && local == "infEvento" && path[0] == "retEvento" {
                    p.current = Some(RawEvent::default());
                }
                path.push(local);
            }
            Ok(Event::Empty(ref e)) => {
                let local = e.local_name();
                if !inside {
                    if local.as_ref() == b"retEnvEvento" {
                        inside = true;
                        closed = true;
                        break;
                    }
                    continue;
                }
                if path.len() == 1 && local.as_ref() == b"infEvento" && path[0] == "retEvento" {
                    p.events.push(RawEvent::default());
                }
            }
            Ok(Event::Text(ref e)) if inside => {
                let text = e
                    .unescape()
                    .map_err(|e| SefazError::Xml(format!("invalid text in retEnvEvento: {e}")))?;
                if !text.is_empty() {
                    p.handle_text(&path, &text);
                }
            }
            Ok(Event::CData(ref e)) if inside => {
                let text = std::str::from_utf8(e)
                    .map_err(|e| SefazError::Xml(format!("CDATA in retEnvEvento is not UTF-8: {e}")))?;
                if !text.trim().is_empty() {
                    p.handle_text(&path, text);
                }
            }
            Ok(Event::End(_)) if inside => {
                let Some(ended) = path.pop() else {
                    closed = true;
                    break;
                };
                if ended == "infEvento" && path.len() == 1 && path[0] == "retEvento" {
                    if let Some(ev) = p.current.take() {
                        p.events.push(ev);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SefazError::Xml(format!(
                    "malformed event response at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    if !inside {
        return Err(SefazError::Protocol(
            "response does not contain retEnvEvento".into(),
        ));
    }
    if !closed {
        return Err(SefazError::Protocol("retEnvEvento is not terminated".into()));
    }

    let result = p.into_result();
    tracing::info!(
        batch_id = result.batch_id,
        status = result.status_code,
        events = result.results.len(),
        "interpreted event response"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope">
  <soap:Body>
    <nfeResultMsg xmlns="http://www.portalfiscal.inf.br/nfe/wsdl/NFeRecepcaoEvento4">
      <retEnvEvento versao="1.00" xmlns="http://www.portalfiscal.inf.br/nfe">
        <idLote>7</idLote><tpAmb>2</tpAmb><verAplic>AN_1.5.0</verAplic>
        <cOrgao>91</cOrgao><cStat>128</cStat><xMotivo>Lote de evento processado</xMotivo>
        <retEvento versao="1.00">
          <infEvento>
            <tpAmb>2</tpAmb><verAplic>AN_1.5.0</verAplic><cOrgao>91</cOrgao>
            <cStat>135</cStat><xMotivo>Evento registrado e vinculado a NF-e</xMotivo>
            <chNFe>35240512345678000195550010000001231000000016</chNFe>
            <tpEvento>210210</tpEvento><xEvento>Ciencia da Operacao</xEvento>
            <nSeqEvento>1</nSeqEvento><CNPJDest>12345678000195</CNPJDest>
            <dhRegEvento>2024-05-10T14:31:02-03:00</dhRegEvento>
            <nProt>891240000012345</nProt>
          </infEvento>
        </retEvento>
      </retEnvEvento>
    </nfeResultMsg>
  </soap:Body>
</soap:Envelope>"#;

    #[test]
    fn interprets_processed_batch() {
        let result = parse_event_response(RESPONSE.as_bytes()).unwrap();
        assert!(result.is_processed());
        assert_eq!(result.batch_id, 7);
        assert_eq!(result.environment(), Some(Environment::Homologation));
        assert_eq!(result.results.len(), 1);
        let ev = &result.results[0];
        assert!(ev.is_registered());
        assert_eq!(ev.event_type, 210210);
        assert_eq!(ev.protocol.as_deref(), Some("891240000012345"));
        assert_eq!(
            ev.recipient,
            Some(TaxpayerId::Cnpj("12345678000195".into()))
        );
        assert!(ev.registered_at.is_some());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn missing_element_is_a_protocol_error() {
        assert!(matches!(
            parse_event_response(b"<soap:Envelope xmlns:soap=\"urn:s\"><soap:Body/></soap:Envelope>"),
            Err(SefazError::Protocol(_))
        ));
    }

    #[test]
    fn self_closing_element_is_recognised() {
        let result = parse_event_response(
            b"<soap:Envelope xmlns:soap=\"urn:s\"><soap:Body><retEnvEvento versao=\"1.00\"/></soap:Body></soap:Envelope>",
        )
        .unwrap();
        assert!(!result.is_processed());
        assert_eq!(result.status_code, 0);
        assert!(result.results.is_empty());
    }

    #[test]
    fn cdata_text_is_read() {
        let body = r#"<retEnvEvento><idLote>2</idLote><cStat>128</cStat>
            <xMotivo><![CDATA[Lote de evento processado & aceito]]></xMotivo>
            <retEvento><infEvento><cStat>135</cStat>
            <xMotivo><![CDATA[Evento registrado]]></xMotivo></infEvento></retEvento>
            <retEvento><infEvento/></retEvento></retEnvEvento>"#;
        let result = parse_event_response(body.as_bytes()).unwrap();
        assert_eq!(result.reason, "Lote de evento processado & aceito");
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].reason, "Evento registrado");
        assert_eq!(result.results[1].status_code, 0);
    }

    #[test]
    fn lenient_numbers_and_timestamps() {
        let body = r#"<retEnvEvento><idLote>x</idLote><cStat>128</cStat>
            <retEvento><infEvento><cStat>??</cStat><nSeqEvento>1</nSeqEvento>
            <dhRegEvento>ontem</dhRegEvento></infEvento></retEvento></retEnvEvento>"#;
        let result = parse_event_response(body.as_bytes()).unwrap();
        assert_eq!(result.batch_id, 0);
        assert_eq!(result.results[0].status_code, 0);
        assert!(result.results[0].registered_at.is_none());
        let fields: Vec<_> = result.warnings.iter().map(|w| w.field.as_str()).collect();
        assert!(fields.contains(&"retEnvEvento.idLote"));
        assert!(fields.contains(&"infEvento.cStat"));
        assert!(fields.contains(&"infEvento.dhRegEvento"));
    }
}
