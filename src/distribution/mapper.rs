//! Streaming `nfeProc` → [`FiscalDocument`] mapping.
//!
//! The reader keeps a stack of local element names and routes every text
//! node by its parent, collecting raw strings first. Conversion into the
//! typed model happens once the whole document has been read.

use std::collections::HashMap;
use std::str::FromStr;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rust_decimal::Decimal;

use crate::core::parse::{clean, date, decimal, integer, timestamp, trimmed};
use crate::core::{DocumentKey, Nsu, ParseWarning, Parsed, SefazError, TaxpayerId};

use super::model::{
    Address, BillingInfo, Carrier, ContributionTax, Direction, FiscalDocument, IcmsOwn,
    IcmsSubstitution, IcmsTax, Installment, Invoice, IpiTax, LineItem, Party, Payment, Purpose,
    Receipt, Totals, TransportInfo, Volume,
};

/// Raw leaf values of one element, by local name.
#[derive(Debug, Default)]
struct Fields(HashMap<String, String>);

impl Fields {
    fn set(&mut self, leaf: &str, text: &str) {
        self.0.entry(leaf.to_string()).or_default().push_str(text);
    }

    fn get(&self, leaf: &str) -> Option<&str> {
        self.0.get(leaf).map(String::as_str)
    }

    fn text(&self, leaf: &str) -> String {
        trimmed(self.get(leaf))
    }

    fn opt(&self, leaf: &str) -> Option<String> {
        clean(self.get(leaf))
    }

    fn decimal(&self, ctx: &str, leaf: &str) -> Result<Decimal, SefazError> {
        decimal(&format!("{ctx}.{leaf}"), self.get(leaf))
    }

    fn integer<T>(&self, ctx: &str, leaf: &str) -> Result<T, SefazError>
    where
        T: FromStr + Default,
        T::Err: std::fmt::Display,
    {
        integer(&format!("{ctx}.{leaf}"), self.get(leaf))
    }

    fn optional_integer<T>(&self, ctx: &str, leaf: &str) -> Result<Option<T>, SefazError>
    where
        T: FromStr + Default,
        T::Err: std::fmt::Display,
    {
        match self.opt(leaf) {
            None => Ok(None),
            Some(_) => self.integer(ctx, leaf).map(Some),
        }
    }

    fn taxpayer(&self) -> Option<TaxpayerId> {
        self.opt("CNPJ")
            .map(TaxpayerId::Cnpj)
            .or_else(|| self.opt("CPF").map(TaxpayerId::Cpf))
    }
}

#[derive(Debug)]
struct TaxGroup {
    name: String,
    fields: Fields,
}

impl TaxGroup {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Fields::default(),
        }
    }
}

#[derive(Debug, Default)]
struct RawItem {
    number: Option<String>,
    prod: Option<Fields>,
    imposto: Fields,
    info: Option<String>,
    icms: Option<TaxGroup>,
    ipi: Option<TaxGroup>,
    ipi_framing: Option<String>,
    pis: Option<TaxGroup>,
    cofins: Option<TaxGroup>,
}

#[derive(Debug, Default)]
struct NfeParsed {
    inf_nfe: bool,
    inf_nfe_id: Option<String>,
    ide: Fields,
    emit: Fields,
    emit_address: Option<Fields>,
    dest: Option<Fields>,
    dest_address: Option<Fields>,
    items: Vec<RawItem>,
    totals: Fields,
    transp: Option<Fields>,
    carrier: Option<Fields>,
    volumes: Vec<Fields>,
    cobr: bool,
    fat: Option<Fields>,
    dups: Vec<Fields>,
    payments: Vec<Fields>,
    inf_adic: Fields,
    prot: Option<Fields>,
}

impl NfeParsed {
    /// `path` already includes the element being opened.
    fn handle_start(&mut self, path: &[String], e: &BytesStart<'_>) -> Result<(), SefazError> {
        let n = path.len();
        let name = path[n - 1].as_str();
        match name {
            "infNFe" => {
                self.inf_nfe = true;
                self.inf_nfe_id = attribute(e, b"Id")?;
            }
            "enderEmit" => self.emit_address = Some(Fields::default()),
            "dest" => self.dest = Some(Fields::default()),
            "enderDest" => self.dest_address = Some(Fields::default()),
            "det" => self.items.push(RawItem {
                number: attribute(e, b"nItem")?,
                ..RawItem::default()
            }),
            "prod" => {
                if let Some(item) = self.items.last_mut() {
                    item.prod = Some(Fields::default());
                }
            }
            "transp" => self.transp = Some(Fields::default()),
            "transporta" => self.carrier = Some(Fields::default()),
            "vol" => self.volumes.push(Fields::default()),
            "cobr" => self.cobr = true,
            "fat" => self.fat = Some(Fields::default()),
            "dup" => self.dups.push(Fields::default()),
            "detPag" => self.payments.push(Fields::default()),
            "infProt" => self.prot = Some(Fields::default()),
            _ if n >= 3 && path[n - 3] == "imposto" => {
                if let Some(item) = self.items.last_mut() {
                    match path[n - 2].as_str() {
                        "ICMS" => item.icms = Some(TaxGroup::new(name)),
                        "IPI" if name == "IPITrib" || name == "IPINT" => {
                            item.ipi = Some(TaxGroup::new(name));
                        }
                        "PIS" => item.pis = Some(TaxGroup::new(name)),
                        "COFINS" => item.cofins = Some(TaxGroup::new(name)),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_text(&mut self, path: &[String], text: &str) {
        let n = path.len();
        if n < 2 {
            return;
        }
        let leaf = path[n - 1].as_str();
        let parent = path[n - 2].as_str();

        let target = match parent {
            "ide" => Some(&mut self.ide),
            "emit" => Some(&mut self.emit),
            "enderEmit" => self.emit_address.as_mut(),
            "dest" => self.dest.as_mut(),
            "enderDest" => self.dest_address.as_mut(),
            "ICMSTot" => Some(&mut self.totals),
            "transp" => self.transp.as_mut(),
            "transporta" => self.carrier.as_mut(),
            "vol" => self.volumes.last_mut(),
            "fat" => self.fat.as_mut(),
            "dup" => self.dups.last_mut(),
            "detPag" => self.payments.last_mut(),
            "infAdic" => Some(&mut self.inf_adic),
            "infProt" => self.prot.as_mut(),
            _ => None,
        };
        if let Some(fields) = target {
            fields.set(leaf, text);
            return;
        }

        let Some(item) = self.items.last_mut() else {
            return;
        };
        match (parent, leaf) {
            ("prod", _) => {
                if let Some(prod) = item.prod.as_mut() {
                    prod.set(leaf, text);
                }
            }
            ("det", "infAdProd") => item.info = Some(text.to_string()),
            ("imposto", _) => item.imposto.set(leaf, text),
            ("IPI", "cEnq") => item.ipi_framing = Some(text.to_string()),
            _ if n >= 4 && path[n - 4] == "imposto" => {
                let group = match path[n - 3].as_str() {
                    "ICMS" => item.icms.as_mut(),
                    "IPI" => item.ipi.as_mut(),
                    "PIS" => item.pis.as_mut(),
                    "COFINS" => item.cofins.as_mut(),
                    _ => None,
                };
                if let Some(group) = group {
                    group.fields.set(leaf, text);
                }
            }
            _ => {}
        }
    }

    fn into_document(self, nsu: Nsu, schema: &str) -> Result<Parsed<FiscalDocument>, SefazError> {
        if !self.inf_nfe {
            return Err(SefazError::mapping("infNFe", "document has no infNFe element"));
        }
        let mut warnings = Vec::new();

        let key_text = self
            .prot
            .as_ref()
            .and_then(|p| p.opt("chNFe"))
            .or_else(|| {
                self.inf_nfe_id
                    .as_deref()
                    .map(|id| {
                        let id = id.trim();
                        id.strip_prefix("NFe").unwrap_or(id).to_string()
                    })
            })
            .ok_or_else(|| SefazError::mapping("chNFe", "no receipt key and no infNFe Id"))?;
        let key = DocumentKey::parse(&key_text)
            .map_err(|e| SefazError::mapping("chNFe", e.to_string()))?;

        let ide = &self.ide;
        let issuer = party(&self.emit, self.emit_address.as_ref(), "emit")?;
        let recipient = self
            .dest
            .as_ref()
            .map(|d| party(d, self.dest_address.as_ref(), "dest"))
            .transpose()?;

        let items = self
            .items
            .into_iter()
            .map(line_item)
            .collect::<Result<Vec<_>, _>>()?;

        let transport = match self.transp {
            None => None,
            Some(t) => Some(TransportInfo {
                freight_mode: t.integer("transp", "modFrete")?,
                carrier: self.carrier.as_ref().map(carrier),
                volumes: self
                    .volumes
                    .iter()
                    .map(volume)
                    .collect::<Result<Vec<_>, _>>()?,
            }),
        };

        let billing = if self.cobr {
            Some(BillingInfo {
                invoice: self.fat.as_ref().map(invoice).transpose()?,
                installments: self
                    .dups
                    .iter()
                    .map(|d| installment(d, &mut warnings))
                    .collect::<Result<Vec<_>, _>>()?,
            })
        } else {
            None
        };

        let payments = self
            .payments
            .iter()
            .map(payment)
            .collect::<Result<Vec<_>, _>>()?;

        let receipt = self
            .prot
            .as_ref()
            .map(|p| receipt(p, &mut warnings))
            .transpose()?;

        let document = FiscalDocument {
            nsu,
            schema: schema.to_string(),
            key,
            number: ide.integer("ide", "nNF")?,
            series: ide.integer("ide", "serie")?,
            model: ide.integer("ide", "mod")?,
            operation_nature: ide.text("natOp"),
            issued_at: timestamp("ide.dhEmi", ide.get("dhEmi"), &mut warnings),
            departure_at: timestamp("ide.dhSaiEnt", ide.get("dhSaiEnt"), &mut warnings),
            direction: ide
                .optional_integer("ide", "tpNF")?
                .and_then(Direction::from_code),
            purpose: ide
                .optional_integer("ide", "finNFe")?
                .and_then(Purpose::from_code),
            issuer,
            recipient,
            items,
            totals: totals(&self.totals)?,
            transport,
            billing,
            payments,
            receipt,
            additional_info: self.inf_adic.opt("infCpl"),
            fiscal_info: self.inf_adic.opt("infAdFisco"),
        };

        Ok(Parsed {
            value: document,
            warnings,
        })
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, SefazError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| SefazError::mapping("nfeProc", format!("malformed attribute: {e}")))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| SefazError::mapping("nfeProc", format!("invalid attribute: {e}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn party(fields: &Fields, address: Option<&Fields>, ctx: &str) -> Result<Party, SefazError> {
    Ok(Party {
        id: fields.taxpayer(),
        name: fields.text("xNome"),
        trade_name: fields.opt("xFant"),
        state_registration: fields.opt("IE"),
        address: address.map(|a| Address {
            street: a.text("xLgr"),
            number: a.text("nro"),
            complement: a.opt("xCpl"),
            district: a.text("xBairro"),
            city_code: a.text("cMun"),
            city: a.text("xMun"),
            state: a.text("UF"),
            postal_code: a.opt("CEP"),
            country_code: a.opt("cPais"),
            country: a.opt("xPais"),
            phone: a.opt("fone"),
        }),
        email: fields.opt("email"),
        tax_regime: fields.optional_integer(ctx, "CRT")?,
    })
}

fn line_item(raw: RawItem) -> Result<LineItem, SefazError> {
    let number: u32 = integer("det.nItem", raw.number.as_deref())?;
    let ctx = format!("det[{number}]");
    let prod = raw
        .prod
        .ok_or_else(|| SefazError::mapping(ctx.as_str(), "line item has no prod element"))?;
    let pctx = format!("{ctx}.prod");

    Ok(LineItem {
        number,
        code: prod.text("cProd"),
        ean: prod.opt("cEAN"),
        description: prod.text("xProd"),
        ncm: prod.text("NCM"),
        cest: prod.opt("CEST"),
        cfop: prod.text("CFOP"),
        unit: prod.text("uCom"),
        quantity: prod.decimal(&pctx, "qCom")?,
        unit_price: prod.decimal(&pctx, "vUnCom")?,
        total: prod.decimal(&pctx, "vProd")?,
        discount: prod.decimal(&pctx, "vDesc")?,
        approximate_tax: raw.imposto.decimal(&format!("{ctx}.imposto"), "vTotTrib")?,
        additional_info: clean(raw.info.as_deref()),
        icms: icms(raw.icms.as_ref(), &ctx)?,
        ipi: ipi(raw.ipi.as_ref(), raw.ipi_framing.as_deref(), &ctx)?,
        pis: contribution(raw.pis.as_ref(), "PIS", &ctx)?,
        cofins: contribution(raw.cofins.as_ref(), "COFINS", &ctx)?,
    })
}

fn icms(group: Option<&TaxGroup>, ctx: &str) -> Result<IcmsTax, SefazError> {
    let Some(group) = group else {
        return Ok(IcmsTax::Absent);
    };
    let f = &group.fields;
    let gctx = format!("{ctx}.{}", group.name);
    let own = || -> Result<IcmsOwn, SefazError> {
        Ok(IcmsOwn {
            origin: f.text("orig"),
            cst: f.text("CST"),
            base: f.decimal(&gctx, "vBC")?,
            rate: f.decimal(&gctx, "pICMS")?,
            amount: f.decimal(&gctx, "vICMS")?,
        })
    };

    let tax = match group.name.as_str() {
        "ICMS00" => IcmsTax::Taxed(own()?),
        "ICMS10" => IcmsTax::TaxedWithSubstitution {
            own: own()?,
            substitution: IcmsSubstitution {
                added_margin: f.decimal(&gctx, "pMVAST")?,
                base: f.decimal(&gctx, "vBCST")?,
                rate: f.decimal(&gctx, "pICMSST")?,
                amount: f.decimal(&gctx, "vICMSST")?,
            },
        },
        "ICMS20" => IcmsTax::ReducedBase {
            own: own()?,
            reduction: f.decimal(&gctx, "pRedBC")?,
        },
        "ICMS40" => IcmsTax::NotTaxed {
            origin: f.text("orig"),
            cst: f.text("CST"),
            relief_amount: f.decimal(&gctx, "vICMSDeson")?,
            relief_reason: f.opt("motDesICMS"),
        },
        "ICMS51" => IcmsTax::Deferred {
            own: own()?,
            deferral_rate: f.decimal(&gctx, "pDif")?,
            deferred_amount: f.decimal(&gctx, "vICMSDif")?,
        },
        "ICMS60" => IcmsTax::ChargedBySubstitution {
            origin: f.text("orig"),
            cst: f.text("CST"),
            withheld_base: f.decimal(&gctx, "vBCSTRet")?,
            withheld_amount: f.decimal(&gctx, "vICMSSTRet")?,
        },
        name if name.starts_with("ICMSSN") => IcmsTax::SimplesNacional {
            origin: f.text("orig"),
            csosn: f.text("CSOSN"),
            credit_rate: f.decimal(&gctx, "pCredSN")?,
            credit_amount: f.decimal(&gctx, "vCredICMSSN")?,
            base: f.decimal(&gctx, "vBC")?,
            rate: f.decimal(&gctx, "pICMS")?,
            amount: f.decimal(&gctx, "vICMS")?,
        },
        other => IcmsTax::Other {
            group: other.to_string(),
            origin: f.text("orig"),
            cst: f.opt("CST"),
            base: f.decimal(&gctx, "vBC")?,
            rate: f.decimal(&gctx, "pICMS")?,
            amount: f.decimal(&gctx, "vICMS")?,
        },
    };
    Ok(tax)
}

fn ipi(group: Option<&TaxGroup>, framing: Option<&str>, ctx: &str) -> Result<IpiTax, SefazError> {
    let Some(group) = group else {
        return Ok(IpiTax::Absent);
    };
    let f = &group.fields;
    let gctx = format!("{ctx}.{}", group.name);
    let framing_code = trimmed(framing);
    Ok(match group.name.as_str() {
        "IPITrib" => IpiTax::Taxed {
            framing_code,
            cst: f.text("CST"),
            base: f.decimal(&gctx, "vBC")?,
            rate: f.decimal(&gctx, "pIPI")?,
            amount: f.decimal(&gctx, "vIPI")?,
        },
        _ => IpiTax::NotTaxed {
            framing_code,
            cst: f.text("CST"),
        },
    })
}

fn contribution(
    group: Option<&TaxGroup>,
    family: &str,
    ctx: &str,
) -> Result<ContributionTax, SefazError> {
    let Some(group) = group else {
        return Ok(ContributionTax::Absent);
    };
    let f = &group.fields;
    let gctx = format!("{ctx}.{}", group.name);
    let rate_leaf = format!("p{family}");
    let amount_leaf = format!("v{family}");
    let cst = f.text("CST");

    Ok(match group.name.strip_prefix(family).unwrap_or_default() {
        "Aliq" => ContributionTax::Rate {
            cst,
            base: f.decimal(&gctx, "vBC")?,
            rate: f.decimal(&gctx, &rate_leaf)?,
            amount: f.decimal(&gctx, &amount_leaf)?,
        },
        "Qtde" => ContributionTax::Quantity {
            cst,
            quantity: f.decimal(&gctx, "qBCProd")?,
            unit_rate: f.decimal(&gctx, "vAliqProd")?,
            amount: f.decimal(&gctx, &amount_leaf)?,
        },
        "NT" => ContributionTax::NotTaxed { cst },
        _ => ContributionTax::Other {
            cst,
            base: f.decimal(&gctx, "vBC")?,
            rate: f.decimal(&gctx, &rate_leaf)?,
            quantity: f.decimal(&gctx, "qBCProd")?,
            unit_rate: f.decimal(&gctx, "vAliqProd")?,
            amount: f.decimal(&gctx, &amount_leaf)?,
        },
    })
}

fn totals(f: &Fields) -> Result<Totals, SefazError> {
    let ctx = "ICMSTot";
    Ok(Totals {
        icms_base: f.decimal(ctx, "vBC")?,
        icms: f.decimal(ctx, "vICMS")?,
        icms_relief: f.decimal(ctx, "vICMSDeson")?,
        substitution_base: f.decimal(ctx, "vBCST")?,
        substitution: f.decimal(ctx, "vST")?,
        products: f.decimal(ctx, "vProd")?,
        freight: f.decimal(ctx, "vFrete")?,
        insurance: f.decimal(ctx, "vSeg")?,
        discount: f.decimal(ctx, "vDesc")?,
        ipi: f.decimal(ctx, "vIPI")?,
        pis: f.decimal(ctx, "vPIS")?,
        cofins: f.decimal(ctx, "vCOFINS")?,
        other: f.decimal(ctx, "vOutro")?,
        total: f.decimal(ctx, "vNF")?,
        approximate_tax: f.decimal(ctx, "vTotTrib")?,
    })
}

fn carrier(f: &Fields) -> Carrier {
    Carrier {
        id: f.taxpayer(),
        name: f.opt("xNome"),
        state_registration: f.opt("IE"),
        address: f.opt("xEnder"),
        city: f.opt("xMun"),
        state: f.opt("UF"),
    }
}

fn volume(f: &Fields) -> Result<Volume, SefazError> {
    Ok(Volume {
        quantity: f.decimal("vol", "qVol")?,
        species: f.opt("esp"),
        brand: f.opt("marca"),
        numbering: f.opt("nVol"),
        net_weight: f.decimal("vol", "pesoL")?,
        gross_weight: f.decimal("vol", "pesoB")?,
    })
}

fn invoice(f: &Fields) -> Result<Invoice, SefazError> {
    Ok(Invoice {
        number: f.opt("nFat"),
        original: f.decimal("fat", "vOrig")?,
        discount: f.decimal("fat", "vDesc")?,
        net: f.decimal("fat", "vLiq")?,
    })
}

fn installment(f: &Fields, warnings: &mut Vec<ParseWarning>) -> Result<Installment, SefazError> {
    Ok(Installment {
        number: f.opt("nDup"),
        due: date("dup.dVenc", f.get("dVenc"), warnings),
        amount: f.decimal("dup", "vDup")?,
    })
}

fn payment(f: &Fields) -> Result<Payment, SefazError> {
    Ok(Payment {
        indicator: f.optional_integer("detPag", "indPag")?,
        method: f.text("tPag"),
        amount: f.decimal("detPag", "vPag")?,
    })
}

fn receipt(f: &Fields, warnings: &mut Vec<ParseWarning>) -> Result<Receipt, SefazError> {
    Ok(Receipt {
        environment_code: f.integer("infProt", "tpAmb")?,
        app_version: f.text("verAplic"),
        key: f.text("chNFe"),
        received_at: timestamp("infProt.dhRecbto", f.get("dhRecbto"), warnings),
        protocol: f.opt("nProt"),
        digest: f.opt("digVal"),
        status_code: f.integer("infProt", "cStat")?,
        reason: f.text("xMotivo"),
    })
}

/// Map a decoded `nfeProc` document.
pub fn map_nfe_proc(nsu: Nsu, schema: &str, xml: &[u8]) -> Result<Parsed<FiscalDocument>, SefazError> {
    let xml = std::str::from_utf8(xml)
        .map_err(|e| SefazError::mapping("nfeProc", format!("document is not UTF-8: {e}")))?;
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut p = NfeParsed::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                p.handle_start(&path, e)?;
            }
            Ok(Event::Empty(ref e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                p.handle_start(&path, e)?;
                path.pop();
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|e| {
                    SefazError::mapping(path.join("/"), format!("invalid character data: {e}"))
                })?;
                if !text.is_empty() {
                    p.handle_text(&path, &text);
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Ok(text) = std::str::from_utf8(e) {
                    p.handle_text(&path, text);
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SefazError::mapping(
                    "nfeProc",
                    format!("malformed XML at position {}: {e}", reader.error_position()),
                ));
            }
            _ => {}
        }
    }

    let parsed = p.into_document(nsu, schema)?;
    tracing::debug!(
        nsu = %nsu,
        key = %parsed.value.key,
        items = parsed.value.items.len(),
        "mapped nfeProc"
    );
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const KEY: &str = "35240512345678000195550010000001231000000016";

    fn single_item(imposto: &str) -> String {
        format!(
            r#"<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe"><NFe><infNFe Id="NFe{KEY}" versao="4.00"><ide><mod>55</mod><serie>1</serie><nNF>7</nNF></ide><emit><CNPJ>12345678000195</CNPJ><xNome>Emitente</xNome></emit><det nItem="1"><prod><cProd>A</cProd><xProd>Item</xProd><qCom>2</qCom><vUnCom>5.00</vUnCom><vProd>10.00</vProd></prod><imposto>{imposto}</imposto></det></infNFe></NFe></nfeProc>"#
        )
    }

    fn first_item(imposto: &str) -> LineItem {
        let parsed = map_nfe_proc(Nsu(1), "procNFe_v4.00.xsd", single_item(imposto).as_bytes()).unwrap();
        parsed.value.items.into_iter().next().unwrap()
    }

    #[test]
    fn icms_alone_leaves_other_families_absent() {
        let item = first_item(
            "<ICMS><ICMS20><orig>0</orig><CST>20</CST><pRedBC>33.33</pRedBC><vBC>6.67</vBC><pICMS>18.00</pICMS><vICMS>1.20</vICMS></ICMS20></ICMS>",
        );
        assert_eq!(
            item.icms,
            IcmsTax::ReducedBase {
                own: IcmsOwn {
                    origin: "0".into(),
                    cst: "20".into(),
                    base: dec!(6.67),
                    rate: dec!(18.00),
                    amount: dec!(1.20),
                },
                reduction: dec!(33.33),
            }
        );
        assert_eq!(item.ipi, IpiTax::Absent);
        assert_eq!(item.pis, ContributionTax::Absent);
        assert_eq!(item.cofins, ContributionTax::Absent);
    }

    #[test]
    fn simples_nacional_groups_share_a_variant() {
        let item = first_item(
            "<ICMS><ICMSSN101><orig>0</orig><CSOSN>101</CSOSN><pCredSN>2.56</pCredSN><vCredICMSSN>0.26</vCredICMSSN></ICMSSN101></ICMS>",
        );
        assert!(matches!(
            item.icms,
            IcmsTax::SimplesNacional { ref csosn, credit_amount, base, .. }
                if csosn == "101" && credit_amount == dec!(0.26) && base == Decimal::ZERO
        ));
    }

    #[test]
    fn unrecognised_icms_group_is_kept_by_name() {
        let item = first_item("<ICMS><ICMS90><orig>1</orig><CST>90</CST></ICMS90></ICMS>");
        assert!(matches!(
            item.icms,
            IcmsTax::Other { ref group, ref cst, amount, .. }
                if group == "ICMS90" && cst.as_deref() == Some("90") && amount == Decimal::ZERO
        ));
    }

    #[test]
    fn missing_numbers_default_to_zero() {
        let parsed = map_nfe_proc(Nsu(1), "procNFe_v4.00.xsd", single_item("").as_bytes()).unwrap();
        let doc = parsed.value;
        assert_eq!(doc.key.as_str(), KEY);
        assert_eq!(doc.items[0].discount, Decimal::ZERO);
        assert_eq!(doc.items[0].approximate_tax, Decimal::ZERO);
        assert_eq!(doc.totals.total, Decimal::ZERO);
        assert!(doc.receipt.is_none());
        assert!(doc.recipient.is_none());
    }

    #[test]
    fn only_one_nfe_prefix_is_stripped_from_the_id() {
        let doubled = single_item("").replace(&format!("NFe{KEY}"), &format!("NFeNFe{KEY}"));
        match map_nfe_proc(Nsu(1), "procNFe_v4.00.xsd", doubled.as_bytes()) {
            Err(SefazError::Mapping { context, .. }) => assert_eq!(context, "chNFe"),
            other => panic!("expected a key mapping error, got {other:?}"),
        }
    }

    #[test]
    fn non_utf8_input_is_a_mapping_error() {
        assert!(matches!(
            map_nfe_proc(Nsu(1), "procNFe_v4.00.xsd", &[0xff, 0xfe, 0x00]),
            Err(SefazError::Mapping { .. })
        ));
    }
}
