//! # Pricing Types
//!
//! Deployment-fixed pricing for convert-gate: currency, unit price in minor
//! units and the purchase mode. None of these are ever taken from client
//! input.

use crate::error::{CheckoutError, CheckoutResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lower-cased ISO 4217 currency code (e.g. "usd")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse a three-letter code, lower-casing it for transmission
    pub fn parse(raw: &str) -> CheckoutResult<Self> {
        let code = raw.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CheckoutError::Configuration(format!(
                "currency code must be three letters, got {:?}",
                code
            )));
        }
        Ok(Self(code.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self("usd".to_string())
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_uppercase())
    }
}

/// Convert a decimal amount in major units to minor units (cents),
/// rounding half-up. Returns `None` on overflow.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Parse a configured decimal price (e.g. "1.98") into minor units
pub fn parse_price_minor_units(raw: &str) -> CheckoutResult<i64> {
    let amount = Decimal::from_str(raw.trim()).map_err(|e| {
        CheckoutError::Configuration(format!("unit price {:?} is not a decimal: {}", raw, e))
    })?;

    to_minor_units(amount).ok_or_else(|| {
        CheckoutError::Configuration(format!("unit price {:?} is out of range", raw))
    })
}

/// Format minor units for logs and display (e.g. "1.98 USD")
pub fn display_amount(minor_units: i64, currency: &CurrencyCode) -> String {
    format!("{} {}", Decimal::new(minor_units, 2), currency)
}

/// What a deployment sells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    /// One-time purchase of a pack of extra conversions
    #[default]
    Pack,
    /// Monthly recurring subscription
    Subscription,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Pack => "pack",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

impl FromStr for CheckoutMode {
    type Err = CheckoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pack" | "payment" | "one_time" => Ok(CheckoutMode::Pack),
            "subscription" | "monthly" => Ok(CheckoutMode::Subscription),
            other => Err(CheckoutError::Configuration(format!(
                "unknown checkout mode {:?} (expected \"pack\" or \"subscription\")",
                other
            ))),
        }
    }
}

impl std::fmt::Display for CheckoutMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_to_minor_units() {
        assert_eq!(parse_price_minor_units("1.98").unwrap(), 198);
        assert_eq!(parse_price_minor_units("1.0").unwrap(), 100);
        assert_eq!(parse_price_minor_units(" 10.99 ").unwrap(), 1099);
    }

    #[test]
    fn test_price_rounds_half_up() {
        assert_eq!(parse_price_minor_units("1.005").unwrap(), 101);
        assert_eq!(parse_price_minor_units("1.004").unwrap(), 100);
        assert_eq!(parse_price_minor_units("0.001").unwrap(), 0);
    }

    #[test]
    fn test_price_rejects_garbage() {
        assert!(parse_price_minor_units("one dollar").is_err());
        assert!(parse_price_minor_units("").is_err());
    }

    #[test]
    fn test_currency_code() {
        assert_eq!(CurrencyCode::parse("USD").unwrap().as_str(), "usd");
        assert_eq!(CurrencyCode::parse(" eur ").unwrap().as_str(), "eur");
        assert!(CurrencyCode::parse("us").is_err());
        assert!(CurrencyCode::parse("u$d").is_err());
        assert_eq!(CurrencyCode::parse("gbp").unwrap().to_string(), "GBP");
    }

    #[test]
    fn test_display_amount() {
        let usd = CurrencyCode::default();
        assert_eq!(display_amount(198, &usd), "1.98 USD");
        assert_eq!(display_amount(5, &usd), "0.05 USD");
    }

    #[test]
    fn test_checkout_mode_parse() {
        assert_eq!("pack".parse::<CheckoutMode>().unwrap(), CheckoutMode::Pack);
        assert_eq!(
            "Subscription".parse::<CheckoutMode>().unwrap(),
            CheckoutMode::Subscription
        );
        assert!("lifetime".parse::<CheckoutMode>().is_err());
    }
}
