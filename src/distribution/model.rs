//! Semantic model of an authorized NF-e (`nfeProc`).
//!
//! Every string is trimmed and empty optional strings are `None`. Money and
//! quantities are [`Decimal`]; a numeric element missing from the source is
//! zero. Tax families use an explicit `Absent` variant: absence means the
//! tax does not apply to the item, never a zero-valued record.

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{DocumentKey, Nsu, TaxpayerId};

/// `tpNF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// 0: entrada.
    Inbound,
    /// 1: saída.
    Outbound,
}

impl Direction {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Inbound),
            1 => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// `finNFe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Purpose {
    Normal,
    Complementary,
    Adjustment,
    Return,
}

impl Purpose {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::Complementary),
            3 => Some(Self::Adjustment),
            4 => Some(Self::Return),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub district: String,
    /// IBGE municipality code.
    pub city_code: String,
    pub city: String,
    pub state: String,
    pub postal_code: Option<String>,
    pub country_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

/// Issuer (`emit`) or recipient (`dest`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: Option<TaxpayerId>,
    pub name: String,
    pub trade_name: Option<String>,
    /// Inscrição estadual.
    pub state_registration: Option<String>,
    pub address: Option<Address>,
    pub email: Option<String>,
    /// `CRT` (issuer only).
    pub tax_regime: Option<u8>,
}

/// Fields shared by the ICMS groups that compute the tax themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmsOwn {
    /// `orig`.
    pub origin: String,
    pub cst: String,
    pub base: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

/// ICMS-ST values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmsSubstitution {
    /// `pMVAST`.
    pub added_margin: Decimal,
    pub base: Decimal,
    pub rate: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IcmsTax {
    #[default]
    Absent,
    /// ICMS00.
    Taxed(IcmsOwn),
    /// ICMS10.
    TaxedWithSubstitution {
        own: IcmsOwn,
        substitution: IcmsSubstitution,
    },
    /// ICMS20.
    ReducedBase {
        own: IcmsOwn,
        /// `pRedBC`.
        reduction: Decimal,
    },
    /// ICMS40 (CST 40, 41 or 50).
    NotTaxed {
        origin: String,
        cst: String,
        /// `vICMSDeson`.
        relief_amount: Decimal,
        /// `motDesICMS`.
        relief_reason: Option<String>,
    },
    /// ICMS51.
    Deferred {
        own: IcmsOwn,
        /// `pDif`.
        deferral_rate: Decimal,
        /// `vICMSDif`.
        deferred_amount: Decimal,
    },
    /// ICMS60.
    ChargedBySubstitution {
        origin: String,
        cst: String,
        /// `vBCSTRet`.
        withheld_base: Decimal,
        /// `vICMSSTRet`.
        withheld_amount: Decimal,
    },
    /// Any ICMSSN group.
    SimplesNacional {
        origin: String,
        csosn: String,
        /// `pCredSN`.
        credit_rate: Decimal,
        /// `vCredICMSSN`.
        credit_amount: Decimal,
        base: Decimal,
        rate: Decimal,
        amount: Decimal,
    },
    /// Any other ICMS group, kept with its name.
    Other {
        group: String,
        origin: String,
        cst: Option<String>,
        base: Decimal,
        rate: Decimal,
        amount: Decimal,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpiTax {
    #[default]
    Absent,
    /// IPITrib.
    Taxed {
        /// `cEnq`.
        framing_code: String,
        cst: String,
        base: Decimal,
        rate: Decimal,
        amount: Decimal,
    },
    /// IPINT.
    NotTaxed { framing_code: String, cst: String },
}

/// PIS or COFINS; both families share the same group layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContributionTax {
    #[default]
    Absent,
    /// `…Aliq`: percentage over a value base.
    Rate {
        cst: String,
        base: Decimal,
        rate: Decimal,
        amount: Decimal,
    },
    /// `…Qtde`: fixed amount per unit.
    Quantity {
        cst: String,
        quantity: Decimal,
        unit_rate: Decimal,
        amount: Decimal,
    },
    /// `…NT`.
    NotTaxed { cst: String },
    /// `…Outr`.
    Other {
        cst: String,
        base: Decimal,
        rate: Decimal,
        quantity: Decimal,
        unit_rate: Decimal,
        amount: Decimal,
    },
}

pub type PisTax = ContributionTax;
pub type CofinsTax = ContributionTax;

/// One `det`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// `nItem`.
    pub number: u32,
    pub code: String,
    /// `cEAN`; "SEM GTIN" is kept as sent.
    pub ean: Option<String>,
    pub description: String,
    pub ncm: String,
    pub cest: Option<String>,
    pub cfop: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total: Decimal,
    pub discount: Decimal,
    /// `vTotTrib`.
    pub approximate_tax: Decimal,
    /// `infAdProd`.
    pub additional_info: Option<String>,
    pub icms: IcmsTax,
    pub ipi: IpiTax,
    pub pis: PisTax,
    pub cofins: CofinsTax,
}

/// `total/ICMSTot`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub icms_base: Decimal,
    pub icms: Decimal,
    pub icms_relief: Decimal,
    pub substitution_base: Decimal,
    pub substitution: Decimal,
    pub products: Decimal,
    pub freight: Decimal,
    pub insurance: Decimal,
    pub discount: Decimal,
    pub ipi: Decimal,
    pub pis: Decimal,
    pub cofins: Decimal,
    pub other: Decimal,
    /// `vNF`.
    pub total: Decimal,
    pub approximate_tax: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Carrier {
    pub id: Option<TaxpayerId>,
    pub name: Option<String>,
    pub state_registration: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub quantity: Decimal,
    pub species: Option<String>,
    pub brand: Option<String>,
    pub numbering: Option<String>,
    pub net_weight: Decimal,
    pub gross_weight: Decimal,
}

/// `transp`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportInfo {
    /// `modFrete`.
    pub freight_mode: u8,
    pub carrier: Option<Carrier>,
    pub volumes: Vec<Volume>,
}

/// `cobr/fat`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub number: Option<String>,
    pub original: Decimal,
    pub discount: Decimal,
    pub net: Decimal,
}

/// `cobr/dup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub number: Option<String>,
    pub due: Option<NaiveDate>,
    pub amount: Decimal,
}

/// `cobr`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingInfo {
    pub invoice: Option<Invoice>,
    pub installments: Vec<Installment>,
}

/// `pag/detPag`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// `indPag`.
    pub indicator: Option<u8>,
    /// `tPag`.
    pub method: String,
    pub amount: Decimal,
}

/// `protNFe/infProt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub environment_code: u8,
    pub app_version: String,
    pub key: String,
    pub received_at: Option<DateTime<FixedOffset>>,
    pub protocol: Option<String>,
    pub digest: Option<String>,
    pub status_code: u16,
    pub reason: String,
}

/// A mapped NF-e.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalDocument {
    pub nsu: Nsu,
    pub schema: String,
    pub key: DocumentKey,
    pub number: u32,
    pub series: u16,
    pub model: u8,
    /// `natOp`.
    pub operation_nature: String,
    pub issued_at: Option<DateTime<FixedOffset>>,
    pub departure_at: Option<DateTime<FixedOffset>>,
    pub direction: Option<Direction>,
    pub purpose: Option<Purpose>,
    pub issuer: Party,
    pub recipient: Option<Party>,
    pub items: Vec<LineItem>,
    pub totals: Totals,
    pub transport: Option<TransportInfo>,
    pub billing: Option<BillingInfo>,
    pub payments: Vec<Payment>,
    pub receipt: Option<Receipt>,
    /// `infCpl`.
    pub additional_info: Option<String>,
    /// `infAdFisco`.
    pub fiscal_info: Option<String>,
}
