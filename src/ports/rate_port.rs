//! Live exchange rate port trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::domain::currency::Currency;
use crate::domain::error::LedgerError;

/// Per-unit local-currency rates as reported by the upstream source.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub rates: BTreeMap<Currency, Decimal>,
    pub fetched_at: DateTime<Utc>,
}

impl RateSnapshot {
    pub fn display_rates(&self) -> BTreeMap<Currency, Decimal> {
        self.rates
            .iter()
            .map(|(currency, rate)| (*currency, currency.to_display_rate(*rate)))
            .collect()
    }
}

#[async_trait]
pub trait RatePort: Send + Sync {
    async fn fetch_rates(&self) -> Result<RateSnapshot, LedgerError>;
}
