//! Trade storage port trait.

use crate::domain::currency::Currency;
use crate::domain::error::LedgerError;
use crate::domain::trade::{NewTrade, Settlement, Trade, TradeId};

pub trait LedgerPort {
    /// Stores a new open trade and returns its assigned id.
    fn insert(&self, trade: &NewTrade) -> Result<TradeId, LedgerError>;

    fn get(&self, id: TradeId) -> Result<Option<Trade>, LedgerError>;

    /// Writes all sell-side fields in one statement, only if the trade is still open.
    ///
    /// Returns the number of rows changed (0 or 1).
    fn close(&self, id: TradeId, settlement: &Settlement) -> Result<usize, LedgerError>;

    fn delete(&self, id: TradeId) -> Result<usize, LedgerError>;

    /// Trades newest first, optionally restricted to one currency.
    fn list(&self, currency: Option<Currency>) -> Result<Vec<Trade>, LedgerError>;
}
