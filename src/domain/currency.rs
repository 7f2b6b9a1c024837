//! Supported foreign currencies and their rate quoting conventions.

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Currency {
    Usd,
    Jpy,
    Eur,
}

impl Currency {
    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Jpy => "JPY",
            Currency::Eur => "EUR",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Jpy => "¥",
            Currency::Eur => "€",
        }
    }

    /// Number of foreign units a display quote is expressed for.
    ///
    /// Yen is quoted per 100 units; everything else per single unit.
    pub fn quote_unit(self) -> Decimal {
        match self {
            Currency::Jpy => Decimal::ONE_HUNDRED,
            Currency::Usd | Currency::Eur => Decimal::ONE,
        }
    }

    /// Converts a stored per-unit rate into the rate shown to users.
    ///
    /// Saturates at `Decimal::MAX`; the engine only stores rates for which
    /// [`Currency::checked_display_rate`] succeeds.
    pub fn to_display_rate(self, per_unit: Decimal) -> Decimal {
        per_unit.saturating_mul(self.quote_unit()).normalize()
    }

    pub fn checked_display_rate(self, per_unit: Decimal) -> Option<Decimal> {
        per_unit
            .checked_mul(self.quote_unit())
            .map(|rate| rate.normalize())
    }

    /// Parses an optional filter value. Blank input means no filter.
    pub fn parse_filter(raw: Option<&str>) -> Option<Result<Currency, LedgerError>> {
        raw.map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Currency::from_str)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl serde::Serialize for Currency {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "JPY" => Ok(Currency::Jpy),
            "EUR" => Ok(Currency::Eur),
            "" => Err(LedgerError::validation("currency is required")),
            other => Err(LedgerError::validation(format!(
                "unsupported currency: {other} (expected USD, JPY or EUR)"
            ))),
        }
    }
}

/// An exchange rate tagged with the convention it was quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateQuote {
    /// Local currency per single foreign unit, as stored.
    PerUnit(Decimal),
    /// Local currency per [`Currency::quote_unit`] foreign units, as typed by a user.
    Display(Decimal),
}

impl RateQuote {
    pub fn raw(self) -> Decimal {
        match self {
            RateQuote::PerUnit(rate) | RateQuote::Display(rate) => rate,
        }
    }

    /// The per-unit rate for `currency`. The only place display quotes are scaled down.
    pub fn per_unit(self, currency: Currency) -> Decimal {
        match self {
            RateQuote::PerUnit(rate) => rate,
            RateQuote::Display(rate) => (rate / currency.quote_unit()).normalize(),
        }
    }
}
