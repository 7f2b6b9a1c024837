//! Trade lots and their open/closed lifecycle state.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use super::currency::Currency;
use super::error::LedgerError;

pub type TradeId = i64;

/// Sell-side fields, all set together when a trade closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub sell_date: NaiveDate,
    pub sell_rate: Decimal,
    pub sell_local: Decimal,
    pub profit: Decimal,
}

impl Settlement {
    /// Prices a sale of the whole lot at `sell_rate` (per unit).
    ///
    /// Fails with `Validation` when the proceeds or profit leave Decimal's range.
    pub fn price(
        buy_amount: Decimal,
        buy_local: Decimal,
        sell_rate: Decimal,
        sell_date: NaiveDate,
    ) -> Result<Self, LedgerError> {
        let sell_local = buy_amount
            .checked_mul(sell_rate)
            .ok_or_else(|| LedgerError::validation("amount × sell rate is out of range"))?;
        let profit = sell_local
            .checked_sub(buy_local)
            .ok_or_else(|| LedgerError::validation("profit is out of range"))?;
        Ok(Settlement {
            sell_date,
            sell_rate,
            sell_local,
            profit,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeState {
    Open,
    Closed(Settlement),
}

impl TradeState {
    /// Rebuilds the state from four nullable store columns.
    ///
    /// Returns `None` when only some of the columns are set.
    pub fn from_columns(
        sell_date: Option<NaiveDate>,
        sell_rate: Option<Decimal>,
        sell_local: Option<Decimal>,
        profit: Option<Decimal>,
    ) -> Option<Self> {
        match (sell_date, sell_rate, sell_local, profit) {
            (None, None, None, None) => Some(TradeState::Open),
            (Some(sell_date), Some(sell_rate), Some(sell_local), Some(profit)) => {
                Some(TradeState::Closed(Settlement {
                    sell_date,
                    sell_rate,
                    sell_local,
                    profit,
                }))
            }
            _ => None,
        }
    }
}

/// A trade that has been validated and priced but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrade {
    pub currency: Currency,
    pub buy_date: NaiveDate,
    pub buy_amount: Decimal,
    pub buy_rate: Decimal,
    pub buy_local: Decimal,
    pub memo: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub id: TradeId,
    pub currency: Currency,
    pub buy_date: NaiveDate,
    pub buy_amount: Decimal,
    pub buy_rate: Decimal,
    pub buy_local: Decimal,
    pub memo: Option<String>,
    pub created_at: NaiveDateTime,
    pub state: TradeState,
}

impl Trade {
    pub fn from_new(id: TradeId, new: NewTrade) -> Self {
        Trade {
            id,
            currency: new.currency,
            buy_date: new.buy_date,
            buy_amount: new.buy_amount,
            buy_rate: new.buy_rate,
            buy_local: new.buy_local,
            memo: new.memo,
            created_at: new.created_at,
            state: TradeState::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, TradeState::Open)
    }

    pub fn settlement(&self) -> Option<&Settlement> {
        match &self.state {
            TradeState::Open => None,
            TradeState::Closed(s) => Some(s),
        }
    }

    pub fn display_buy_rate(&self) -> Decimal {
        self.currency.to_display_rate(self.buy_rate)
    }

    pub fn display_sell_rate(&self) -> Option<Decimal> {
        self.settlement()
            .map(|s| self.currency.to_display_rate(s.sell_rate))
    }
}
