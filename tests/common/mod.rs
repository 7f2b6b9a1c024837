#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use fxledger::domain::currency::Currency;
use fxledger::domain::error::LedgerError;
use fxledger::domain::trade::{NewTrade, Settlement, Trade, TradeId, TradeState};
use fxledger::ports::ledger_port::LedgerPort;
use fxledger::ports::rate_port::{RatePort, RateSnapshot};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// In-memory store with the same conditional-close semantics as the SQL adapters.
pub struct MockLedgerPort {
    trades: Mutex<Vec<Trade>>,
    next_id: Mutex<TradeId>,
}

impl MockLedgerPort {
    pub fn new() -> Self {
        Self {
            trades: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.trades.lock().unwrap().len()
    }
}

impl LedgerPort for MockLedgerPort {
    fn insert(&self, trade: &NewTrade) -> Result<TradeId, LedgerError> {
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        self.trades
            .lock()
            .unwrap()
            .push(Trade::from_new(id, trade.clone()));
        Ok(id)
    }

    fn get(&self, id: TradeId) -> Result<Option<Trade>, LedgerError> {
        Ok(self
            .trades
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    fn close(&self, id: TradeId, settlement: &Settlement) -> Result<usize, LedgerError> {
        let mut trades = self.trades.lock().unwrap();
        match trades.iter_mut().find(|t| t.id == id && t.is_open()) {
            Some(trade) => {
                trade.state = TradeState::Closed(settlement.clone());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete(&self, id: TradeId) -> Result<usize, LedgerError> {
        let mut trades = self.trades.lock().unwrap();
        let before = trades.len();
        trades.retain(|t| t.id != id);
        Ok(before - trades.len())
    }

    fn list(&self, currency: Option<Currency>) -> Result<Vec<Trade>, LedgerError> {
        let mut trades: Vec<Trade> = self
            .trades
            .lock()
            .unwrap()
            .iter()
            .filter(|t| currency.is_none_or(|c| t.currency == c))
            .cloned()
            .collect();
        trades.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(trades)
    }
}

/// Rate source returning a fixed snapshot, or an upstream failure.
pub struct MockRatePort {
    pub rates: Option<BTreeMap<Currency, Decimal>>,
}

impl MockRatePort {
    pub fn with_rates(rates: &[(Currency, Decimal)]) -> Self {
        Self {
            rates: Some(rates.iter().copied().collect()),
        }
    }

    pub fn failing() -> Self {
        Self { rates: None }
    }
}

#[async_trait]
impl RatePort for MockRatePort {
    async fn fetch_rates(&self) -> Result<RateSnapshot, LedgerError> {
        match &self.rates {
            Some(rates) => Ok(RateSnapshot {
                rates: rates.clone(),
                fetched_at: Utc::now(),
            }),
            None => Err(LedgerError::Upstream {
                reason: "rate API request failed with status 503 Service Unavailable".into(),
            }),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(h, min, 0).unwrap()
}
