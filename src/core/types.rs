use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SefazError;

/// `tpAmb`: which authority environment a message targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    /// 1: Produção.
    Production,
    /// 2: Homologação (test environment, no fiscal effect).
    Homologation,
}

impl Environment {
    /// Numeric `tpAmb` code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Production => 1,
            Self::Homologation => 2,
        }
    }

    /// Parse from the numeric `tpAmb` code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Production),
            2 => Some(Self::Homologation),
            _ => None,
        }
    }
}

/// Taxpayer identifier: either a company CNPJ (14 digits) or a person CPF (11 digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaxpayerId {
    Cnpj(String),
    Cpf(String),
}

impl TaxpayerId {
    /// Build a CNPJ identifier, accepting punctuation ("12.345.678/0001-95").
    pub fn cnpj(value: &str) -> Result<Self, SefazError> {
        let digits = only_digits(value);
        if digits.len() != 14 {
            return Err(SefazError::Validation(format!(
                "CNPJ must have 14 digits, got {} in '{value}'",
                digits.len()
            )));
        }
        Ok(Self::Cnpj(digits))
    }

    /// Build a CPF identifier, accepting punctuation ("123.456.789-09").
    pub fn cpf(value: &str) -> Result<Self, SefazError> {
        let digits = only_digits(value);
        if digits.len() != 11 {
            return Err(SefazError::Validation(format!(
                "CPF must have 11 digits, got {} in '{value}'",
                digits.len()
            )));
        }
        Ok(Self::Cpf(digits))
    }

    /// Element name used by the NF-e schemas ("CNPJ" or "CPF").
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Cnpj(_) => "CNPJ",
            Self::Cpf(_) => "CPF",
        }
    }

    /// The bare digits.
    pub fn digits(&self) -> &str {
        match self {
            Self::Cnpj(d) | Self::Cpf(d) => d,
        }
    }
}

impl fmt::Display for TaxpayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag(), self.digits())
    }
}

fn only_digits(value: &str) -> String {
    value.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// 44-digit NF-e access key (chave de acesso).
///
/// Layout: cUF(2) AAMM(4) CNPJ(14) mod(2) serie(3) nNF(9) tpEmis(1) cNF(8) cDV(1).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentKey(String);

impl DocumentKey {
    pub const LEN: usize = 44;

    /// Parse a key, rejecting anything that is not exactly 44 ASCII digits.
    pub fn parse(value: &str) -> Result<Self, SefazError> {
        let value = value.trim();
        if value.len() != Self::LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SefazError::Validation(format!(
                "document key must be 44 digits, got '{value}'"
            )));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// IBGE code of the authorizing state (first two digits).
    pub fn region_code(&self) -> u8 {
        // Both bytes are ASCII digits by construction.
        let b = self.0.as_bytes();
        (b[0] - b'0') * 10 + (b[1] - b'0')
    }

    /// Document model (55 = NF-e, 65 = NFC-e).
    pub fn model(&self) -> &str {
        &self.0[20..22]
    }

    /// Issuer CNPJ embedded in the key.
    pub fn issuer_cnpj(&self) -> &str {
        &self.0[6..20]
    }

    /// Whether the last digit matches the modulo-11 check digit of the first 43.
    pub fn has_valid_check_digit(&self) -> bool {
        let digits = self.0.as_bytes();
        let mut sum = 0u32;
        let mut weight = 2u32;
        for &d in digits[..43].iter().rev() {
            sum += u32::from(d - b'0') * weight;
            weight = if weight == 9 { 2 } else { weight + 1 };
        }
        let expected = match 11 - (sum % 11) {
            r if r >= 10 => 0,
            r => r,
        };
        u32::from(digits[43] - b'0') == expected
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DocumentKey {
    type Err = SefazError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocumentKey {
    type Error = SefazError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentKey> for String {
    fn from(key: DocumentKey) -> Self {
        key.0
    }
}

/// Número Sequencial Único, the position of a document in the distribution backlog.
///
/// Rendered on the wire as 15 zero-padded digits.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Nsu(pub u64);

impl Nsu {
    pub const ZERO: Nsu = Nsu(0);
    pub const WIDTH: usize = 15;

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Nsu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0>width$}", self.0, width = Self::WIDTH)
    }
}

impl FromStr for Nsu {
    type Err = SefazError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.len() > Self::WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SefazError::Protocol(format!("invalid NSU '{s}'")));
        }
        s.parse::<u64>()
            .map(Nsu)
            .map_err(|e| SefazError::Protocol(format!("invalid NSU '{s}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_region_and_parts() {
        let key = DocumentKey::parse("35240512345678000195550010000001231000000016").unwrap();
        assert_eq!(key.region_code(), 35);
        assert_eq!(key.model(), "55");
        assert_eq!(key.issuer_cnpj(), "12345678000195");
        assert!(key.has_valid_check_digit());
    }

    #[test]
    fn key_rejects_bad_input() {
        assert!(DocumentKey::parse("123").is_err());
        assert!(DocumentKey::parse("3524051234567800019555001000000123100000001X").is_err());
    }

    #[test]
    fn key_check_digit_mismatch() {
        let key = DocumentKey::parse("35240512345678000195550010000001231000000017").unwrap();
        assert!(!key.has_valid_check_digit());
    }

    #[test]
    fn nsu_padding() {
        assert_eq!(Nsu(42).to_string(), "000000000000042");
        assert_eq!("000000000000042".parse::<Nsu>().unwrap(), Nsu(42));
        assert!("".parse::<Nsu>().is_err());
        assert!("12a".parse::<Nsu>().is_err());
    }

    #[test]
    fn taxpayer_strips_punctuation() {
        let id = TaxpayerId::cnpj("12.345.678/0001-95").unwrap();
        assert_eq!(id.digits(), "12345678000195");
        assert_eq!(id.tag(), "CNPJ");
        assert!(TaxpayerId::cpf("123").is_err());
    }
}
