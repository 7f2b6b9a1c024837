//! SQLite ledger adapter.
//!
//! Decimals are stored as TEXT so no precision is lost to SQLite's REAL type.

use crate::domain::currency::Currency;
use crate::domain::error::LedgerError;
use crate::domain::trade::{NewTrade, Settlement, Trade, TradeId, TradeState};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerPort;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const SELECT_COLUMNS: &str = "SELECT id, currency, buy_date, buy_amount, buy_rate, buy_local,
                                     sell_date, sell_rate, sell_local, profit, memo, created_at
                              FROM transactions";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LedgerError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| LedgerError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(LedgerError::database)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        tracing::info!(path = %db_path, pool_size, "opened sqlite ledger");
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, LedgerError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(LedgerError::database)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, LedgerError> {
        self.pool.get().map_err(LedgerError::database)
    }

    pub fn initialize_schema(&self) -> Result<(), LedgerError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS transactions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    currency TEXT NOT NULL,
                    buy_date TEXT NOT NULL,
                    buy_amount TEXT NOT NULL,
                    buy_rate TEXT NOT NULL,
                    buy_local TEXT NOT NULL,
                    sell_date TEXT,
                    sell_rate TEXT,
                    sell_local TEXT,
                    profit TEXT,
                    memo TEXT,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_transactions_currency ON transactions(currency);
                CREATE INDEX IF NOT EXISTS idx_transactions_created ON transactions(created_at);",
            )
            .map_err(LedgerError::query)
    }
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn get_opt_decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Decimal::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn get_date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn map_trade(row: &Row<'_>) -> rusqlite::Result<Trade> {
    let id: TradeId = row.get(0)?;
    let currency_code: String = row.get(1)?;
    let currency = Currency::from_str(&currency_code).map_err(|e| conversion_error(1, e))?;
    let buy_date = get_date(row, 2)?.ok_or(rusqlite::Error::InvalidColumnType(
        2,
        "buy_date".into(),
        Type::Null,
    ))?;
    let created_raw: String = row.get(11)?;
    let created_at = NaiveDateTime::parse_from_str(&created_raw, TIMESTAMP_FORMAT)
        .map_err(|e| conversion_error(11, e))?;

    let state = TradeState::from_columns(
        get_date(row, 6)?,
        get_opt_decimal(row, 7)?,
        get_opt_decimal(row, 8)?,
        get_opt_decimal(row, 9)?,
    )
    .ok_or_else(|| {
        conversion_error(
            6,
            LedgerError::DatabaseQuery {
                reason: format!("trade {id} is partially closed"),
            },
        )
    })?;

    Ok(Trade {
        id,
        currency,
        buy_date,
        buy_amount: get_decimal(row, 3)?,
        buy_rate: get_decimal(row, 4)?,
        buy_local: get_decimal(row, 5)?,
        memo: row.get(10)?,
        created_at,
        state,
    })
}

impl LedgerPort for SqliteAdapter {
    fn insert(&self, trade: &NewTrade) -> Result<TradeId, LedgerError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO transactions (currency, buy_date, buy_amount, buy_rate, buy_local, memo, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                trade.currency.code(),
                trade.buy_date.format(DATE_FORMAT).to_string(),
                trade.buy_amount.to_string(),
                trade.buy_rate.to_string(),
                trade.buy_local.to_string(),
                trade.memo,
                trade.created_at.format(TIMESTAMP_FORMAT).to_string(),
            ],
        )
        .map_err(LedgerError::query)?;

        Ok(conn.last_insert_rowid())
    }

    fn get(&self, id: TradeId) -> Result<Option<Trade>, LedgerError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            params![id],
            map_trade,
        )
        .optional()
        .map_err(LedgerError::query)
    }

    fn close(&self, id: TradeId, settlement: &Settlement) -> Result<usize, LedgerError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE transactions
             SET sell_date = ?1, sell_rate = ?2, sell_local = ?3, profit = ?4
             WHERE id = ?5 AND sell_date IS NULL",
            params![
                settlement.sell_date.format(DATE_FORMAT).to_string(),
                settlement.sell_rate.to_string(),
                settlement.sell_local.to_string(),
                settlement.profit.to_string(),
                id,
            ],
        )
        .map_err(LedgerError::query)
    }

    fn delete(&self, id: TradeId) -> Result<usize, LedgerError> {
        self.conn()?
            .execute("DELETE FROM transactions WHERE id = ?1", params![id])
            .map_err(LedgerError::query)
    }

    fn list(&self, currency: Option<Currency>) -> Result<Vec<Trade>, LedgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_COLUMNS}
                 WHERE ?1 IS NULL OR currency = ?1
                 ORDER BY created_at DESC, id DESC"
            ))
            .map_err(LedgerError::query)?;

        let rows = stmt
            .query_map(params![currency.map(Currency::code)], map_trade)
            .map_err(LedgerError::query)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(LedgerError::query)
    }
}
