//! Trade export port trait.

use chrono::NaiveDateTime;

use crate::domain::currency::Currency;
use crate::domain::error::LedgerError;
use crate::domain::trade::Trade;

pub trait ExportPort {
    fn render(&self, trades: &[Trade]) -> Result<Vec<u8>, LedgerError>;

    fn content_type(&self) -> &'static str;

    fn extension(&self) -> &'static str;

    /// Default implementation: `exchange_<CURRENCY|all>_<YYYYMMDD_HHMMSS>.<ext>`.
    fn file_name(&self, currency: Option<Currency>, at: NaiveDateTime) -> String {
        let scope = currency.map_or("all", Currency::code);
        format!(
            "exchange_{}_{}.{}",
            scope,
            at.format("%Y%m%d_%H%M%S"),
            self.extension()
        )
    }
}
