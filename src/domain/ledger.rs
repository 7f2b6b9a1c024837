//! Trade lifecycle engine: opening, closing, deleting and listing lots.
//!
//! Every function takes the store as `&dyn LedgerPort` and a caller-supplied
//! clock value, so the engine itself holds no state.

use chrono::{Local, NaiveDate, NaiveDateTime, SubsecRound};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::currency::{Currency, RateQuote};
use super::error::LedgerError;
use super::trade::{NewTrade, Settlement, Trade, TradeId, TradeState};
use crate::ports::ledger_port::LedgerPort;

/// A validated purchase, rate already converted to per-unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyOrder {
    pub currency: Currency,
    pub amount: Decimal,
    pub rate: Decimal,
    pub memo: Option<String>,
}

impl BuyOrder {
    pub fn new(
        currency: Option<&str>,
        amount: Option<Decimal>,
        rate: Option<RateQuote>,
        memo: Option<String>,
    ) -> Result<Self, LedgerError> {
        let currency = Currency::from_str(currency.unwrap_or_default())?;
        let amount = require_positive("buy amount", amount)?;
        let rate = rate.ok_or_else(|| LedgerError::validation("buy rate is required"))?;
        let rate = per_unit_rate("buy rate", rate, currency)?;

        Ok(BuyOrder {
            currency,
            amount,
            rate,
            memo: memo
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
        })
    }
}

/// Current local time at the microsecond resolution the stores keep.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(6)
}

fn require_positive(field: &str, value: Option<Decimal>) -> Result<Decimal, LedgerError> {
    match value {
        None => Err(LedgerError::validation(format!("{field} is required"))),
        Some(v) if v <= Decimal::ZERO => Err(LedgerError::validation(format!(
            "{field} must be greater than zero"
        ))),
        Some(v) => Ok(v),
    }
}

/// Converts a positive quote to a per-unit rate that stays positive and
/// can still be shown in display form.
fn per_unit_rate(field: &str, quote: RateQuote, currency: Currency) -> Result<Decimal, LedgerError> {
    require_positive(field, Some(quote.raw()))?;
    let rate = quote.per_unit(currency);
    if rate.is_zero() {
        return Err(LedgerError::validation(format!("{field} is too small")));
    }
    if currency.checked_display_rate(rate).is_none() {
        return Err(LedgerError::validation(format!("{field} is out of range")));
    }
    Ok(rate)
}

pub fn open_trade(
    ledger: &dyn LedgerPort,
    order: BuyOrder,
    now: NaiveDateTime,
) -> Result<Trade, LedgerError> {
    let buy_local = order
        .amount
        .checked_mul(order.rate)
        .ok_or_else(|| LedgerError::validation("amount × buy rate is out of range"))?;

    let new = NewTrade {
        currency: order.currency,
        buy_date: now.date(),
        buy_amount: order.amount,
        buy_rate: order.rate,
        buy_local,
        memo: order.memo,
        created_at: now,
    };

    let id = ledger.insert(&new)?;
    tracing::info!(
        id,
        currency = %new.currency,
        amount = %new.buy_amount,
        rate = %new.buy_rate,
        "trade opened"
    );
    Ok(Trade::from_new(id, new))
}

/// Closes an open trade at `sell_rate`.
///
/// The sell fields are written by a single conditional update; losing a race
/// against a concurrent close surfaces as `AlreadyClosed`.
pub fn close_trade(
    ledger: &dyn LedgerPort,
    id: TradeId,
    sell_rate: Option<RateQuote>,
    today: NaiveDate,
) -> Result<Settlement, LedgerError> {
    let quote = sell_rate.ok_or_else(|| LedgerError::validation("sell rate is required"))?;
    require_positive("sell rate", Some(quote.raw()))?;

    let trade = ledger.get(id)?.ok_or(LedgerError::NotFound { id })?;
    if let TradeState::Closed(_) = trade.state {
        return Err(LedgerError::AlreadyClosed { id });
    }

    let rate = per_unit_rate("sell rate", quote, trade.currency)?;
    let settlement = Settlement::price(trade.buy_amount, trade.buy_local, rate, today)?;

    if ledger.close(id, &settlement)? == 0 {
        return Err(match ledger.get(id)? {
            Some(_) => LedgerError::AlreadyClosed { id },
            None => LedgerError::NotFound { id },
        });
    }

    tracing::info!(id, profit = %settlement.profit, "trade closed");
    Ok(settlement)
}

pub fn delete_trade(ledger: &dyn LedgerPort, id: TradeId) -> Result<(), LedgerError> {
    if ledger.delete(id)? == 0 {
        return Err(LedgerError::NotFound { id });
    }
    tracing::info!(id, "trade deleted");
    Ok(())
}

/// Lists trades newest first. Unknown currency codes match nothing.
pub fn list_trades(
    ledger: &dyn LedgerPort,
    filter: Option<&str>,
) -> Result<Vec<Trade>, LedgerError> {
    match Currency::parse_filter(filter) {
        None => ledger.list(None),
        Some(Ok(currency)) => ledger.list(Some(currency)),
        Some(Err(_)) => Ok(Vec::new()),
    }
}
