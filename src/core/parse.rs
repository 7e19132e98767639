//! Field conversions shared by the response parsers.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;

use super::error::{ParseWarning, SefazError};

/// Trim, mapping empty text to `None`.
pub(crate) fn clean(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Trim, mapping absent text to an empty string.
pub(crate) fn trimmed(raw: Option<&str>) -> String {
    raw.map(str::trim).unwrap_or_default().to_string()
}

/// RFC 3339 timestamp; anything else becomes `None` plus a warning.
pub(crate) fn timestamp(
    field: &str,
    raw: Option<&str>,
    warnings: &mut Vec<ParseWarning>,
) -> Option<DateTime<FixedOffset>> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts),
        Err(e) => {
            warnings.push(ParseWarning::new(
                field,
                raw,
                format!("unparseable timestamp: {e}"),
            ));
            None
        }
    }
}

/// `AAAA-MM-DD` date; anything else becomes `None` plus a warning.
pub(crate) fn date(field: &str, raw: Option<&str>, warnings: &mut Vec<ParseWarning>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(e) => {
            warnings.push(ParseWarning::new(field, raw, format!("unparseable date: {e}")));
            None
        }
    }
}

/// Decimal value; absent means zero, malformed text is a mapping error.
pub(crate) fn decimal(field: &str, raw: Option<&str>) -> Result<Decimal, SefazError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Decimal::ZERO),
        Some(s) => Decimal::from_str(s)
            .map_err(|e| SefazError::mapping(field, format!("invalid decimal '{s}': {e}"))),
    }
}

/// Integer value; absent means zero, malformed text is a mapping error.
pub(crate) fn integer<T>(field: &str, raw: Option<&str>) -> Result<T, SefazError>
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(T::default()),
        Some(s) => s
            .parse::<T>()
            .map_err(|e| SefazError::mapping(field, format!("invalid integer '{s}': {e}"))),
    }
}

/// Integer value where malformed text falls back to zero with a warning.
pub(crate) fn lenient_integer<T>(field: &str, raw: Option<&str>, warnings: &mut Vec<ParseWarning>) -> T
where
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => T::default(),
        Some(s) => s.parse::<T>().unwrap_or_else(|e| {
            warnings.push(ParseWarning::new(field, s, format!("invalid integer: {e}")));
            T::default()
        }),
    }
}
