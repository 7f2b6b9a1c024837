//! CSV trade export adapter.
//!
//! Output is UTF-8 with a leading byte-order mark so spreadsheet tools pick
//! the right encoding.

use crate::domain::error::LedgerError;
use crate::domain::trade::Trade;
use crate::ports::export_port::ExportPort;

const BOM: &[u8] = "\u{FEFF}".as_bytes();

const HEADERS: [&str; 11] = [
    "ID",
    "Currency",
    "BuyDate",
    "BuyAmount",
    "BuyRate",
    "BuyLocal",
    "SellDate",
    "SellRate",
    "SellLocal",
    "Profit",
    "Memo",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvAdapter;

impl CsvAdapter {
    pub fn new() -> Self {
        Self
    }

    fn record(trade: &Trade) -> [String; 11] {
        let (sell_date, sell_rate, sell_local, profit) = match trade.settlement() {
            Some(s) => (
                s.sell_date.format("%Y-%m-%d").to_string(),
                s.sell_rate.to_string(),
                s.sell_local.to_string(),
                s.profit.to_string(),
            ),
            None => Default::default(),
        };

        [
            trade.id.to_string(),
            trade.currency.code().to_string(),
            trade.buy_date.format("%Y-%m-%d").to_string(),
            trade.buy_amount.to_string(),
            trade.buy_rate.to_string(),
            trade.buy_local.to_string(),
            sell_date,
            sell_rate,
            sell_local,
            profit,
            trade.memo.as_deref().unwrap_or_default().replace(',', " "),
        ]
    }
}

impl ExportPort for CsvAdapter {
    fn render(&self, trades: &[Trade]) -> Result<Vec<u8>, LedgerError> {
        let mut wtr = csv::Writer::from_writer(BOM.to_vec());

        wtr.write_record(HEADERS).map_err(|e| LedgerError::Io(e.into()))?;
        for trade in trades {
            wtr.write_record(Self::record(trade))
                .map_err(|e| LedgerError::Io(e.into()))?;
        }

        wtr.into_inner()
            .map_err(|e| LedgerError::Io(e.into_error()))
    }

    fn content_type(&self) -> &'static str {
        "text/csv; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }
}
