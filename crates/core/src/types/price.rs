//! Currency codes and minor-unit conversion.
//!
//! Amounts are kept in the currency's major unit (rupees, dollars) as
//! [`Decimal`]. The payment gateway speaks integer minor units (paise, cents);
//! [`CurrencyCode::to_minor_units`] is the single place that conversion happens.

use core::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// ISO 4217 currency codes accepted at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Number of minor units per major unit, as a power of ten.
    #[must_use]
    pub const fn exponent(self) -> u32 {
        2
    }

    /// The three-letter code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    /// Convert a major-unit amount to integer minor units, rounding half away
    /// from zero to the currency's precision.
    #[must_use]
    pub fn to_minor_units(self, amount: Decimal) -> Option<i64> {
        let scale = Decimal::from(10_i64.pow(self.exponent()));
        amount
            .checked_mul(scale)?
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }

    /// Convert integer minor units back to a major-unit amount.
    #[must_use]
    pub fn from_minor_units(self, minor: i64) -> Decimal {
        Decimal::new(minor, self.exponent())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units() {
        let inr = CurrencyCode::INR;
        assert_eq!(inr.to_minor_units(Decimal::new(540, 0)), Some(54_000));
        assert_eq!(inr.to_minor_units(Decimal::new(19_995, 3)), Some(2_000));
        assert_eq!(inr.from_minor_units(54_000), Decimal::new(540, 0));
    }

    #[test]
    fn test_minor_units_overflow() {
        assert_eq!(CurrencyCode::USD.to_minor_units(Decimal::MAX), None);
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("inr".parse::<CurrencyCode>().unwrap(), CurrencyCode::INR);
        assert!("XYZ".parse::<CurrencyCode>().is_err());
    }
}
