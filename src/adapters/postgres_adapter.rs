//! PostgreSQL ledger adapter.

use crate::domain::currency::Currency;
use crate::domain::error::LedgerError;
use crate::domain::trade::{NewTrade, Settlement, Trade, TradeId, TradeState};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerPort;
use chrono::{NaiveDate, NaiveDateTime};
use postgres::{NoTls, Row};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;
use rust_decimal::Decimal;
use std::str::FromStr;

const SELECT_COLUMNS: &str = "SELECT id, currency, buy_date, buy_amount, buy_rate, buy_local, \
                                     sell_date, sell_rate, sell_local, profit, memo, created_at \
                              FROM transactions";

type Manager = PostgresConnectionManager<NoTls>;

pub struct PostgresAdapter {
    pool: Pool<Manager>,
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LedgerError> {
        // [postgres] connection_string, then [database] conninfo, then DATABASE_URL
        let connection_string = config
            .get_string("postgres", "connection_string")
            .or_else(|| config.get_string("database", "conninfo"))
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or_else(|| LedgerError::ConfigMissing {
                section: "database".into(),
                key: "conninfo".into(),
            })?;

        let pg_config = connection_string
            .parse::<postgres::Config>()
            .map_err(|e| LedgerError::ConfigInvalid {
                section: "database".into(),
                key: "conninfo".into(),
                reason: e.to_string(),
            })?;

        let pool_size = config.get_int("postgres", "pool_size", 4).max(1) as u32;
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(PostgresConnectionManager::new(pg_config, NoTls))
            .map_err(LedgerError::database)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        tracing::info!(pool_size, "opened postgres ledger");
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<Manager>, LedgerError> {
        self.pool.get().map_err(LedgerError::database)
    }

    pub fn initialize_schema(&self) -> Result<(), LedgerError> {
        self.conn()?
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS transactions (
                    id BIGSERIAL PRIMARY KEY,
                    currency VARCHAR(10) NOT NULL,
                    buy_date DATE NOT NULL,
                    buy_amount NUMERIC NOT NULL,
                    buy_rate NUMERIC NOT NULL,
                    buy_local NUMERIC NOT NULL,
                    sell_date DATE,
                    sell_rate NUMERIC,
                    sell_local NUMERIC,
                    profit NUMERIC,
                    memo TEXT,
                    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                CREATE INDEX IF NOT EXISTS idx_transactions_currency ON transactions(currency);",
            )
            .map_err(LedgerError::query)
    }
}

fn map_trade(row: &Row) -> Result<Trade, LedgerError> {
    let id: TradeId = row.try_get(0).map_err(LedgerError::query)?;
    let currency_code: String = row.try_get(1).map_err(LedgerError::query)?;
    let sell_date: Option<NaiveDate> = row.try_get(6).map_err(LedgerError::query)?;
    let sell_rate: Option<Decimal> = row.try_get(7).map_err(LedgerError::query)?;
    let sell_local: Option<Decimal> = row.try_get(8).map_err(LedgerError::query)?;
    let profit: Option<Decimal> = row.try_get(9).map_err(LedgerError::query)?;

    let state = TradeState::from_columns(sell_date, sell_rate, sell_local, profit).ok_or_else(
        || LedgerError::DatabaseQuery {
            reason: format!("trade {id} is partially closed"),
        },
    )?;

    Ok(Trade {
        id,
        currency: Currency::from_str(&currency_code).map_err(LedgerError::query)?,
        buy_date: row.try_get(2).map_err(LedgerError::query)?,
        buy_amount: row.try_get(3).map_err(LedgerError::query)?,
        buy_rate: row.try_get(4).map_err(LedgerError::query)?,
        buy_local: row.try_get(5).map_err(LedgerError::query)?,
        memo: row.try_get(10).map_err(LedgerError::query)?,
        created_at: row
            .try_get::<_, NaiveDateTime>(11)
            .map_err(LedgerError::query)?,
        state,
    })
}

impl LedgerPort for PostgresAdapter {
    fn insert(&self, trade: &NewTrade) -> Result<TradeId, LedgerError> {
        let row = self
            .conn()?
            .query_one(
                "INSERT INTO transactions \
                     (currency, buy_date, buy_amount, buy_rate, buy_local, memo, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 RETURNING id",
                &[
                    &trade.currency.code(),
                    &trade.buy_date,
                    &trade.buy_amount,
                    &trade.buy_rate,
                    &trade.buy_local,
                    &trade.memo,
                    &trade.created_at,
                ],
            )
            .map_err(LedgerError::query)?;

        row.try_get(0).map_err(LedgerError::query)
    }

    fn get(&self, id: TradeId) -> Result<Option<Trade>, LedgerError> {
        let row = self
            .conn()?
            .query_opt(format!("{SELECT_COLUMNS} WHERE id = $1").as_str(), &[&id])
            .map_err(LedgerError::query)?;

        row.as_ref().map(map_trade).transpose()
    }

    fn close(&self, id: TradeId, settlement: &Settlement) -> Result<usize, LedgerError> {
        let updated = self
            .conn()?
            .execute(
                "UPDATE transactions \
                 SET sell_date = $1, sell_rate = $2, sell_local = $3, profit = $4 \
                 WHERE id = $5 AND sell_date IS NULL",
                &[
                    &settlement.sell_date,
                    &settlement.sell_rate,
                    &settlement.sell_local,
                    &settlement.profit,
                    &id,
                ],
            )
            .map_err(LedgerError::query)?;

        Ok(updated as usize)
    }

    fn delete(&self, id: TradeId) -> Result<usize, LedgerError> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM transactions WHERE id = $1", &[&id])
            .map_err(LedgerError::query)?;

        Ok(deleted as usize)
    }

    fn list(&self, currency: Option<Currency>) -> Result<Vec<Trade>, LedgerError> {
        let code = currency.map(Currency::code);
        let rows = self
            .conn()?
            .query(
                format!(
                    "{SELECT_COLUMNS} \
                     WHERE $1::text IS NULL OR currency = $1 \
                     ORDER BY created_at DESC, id DESC"
                )
                .as_str(),
                &[&code],
            )
            .map_err(LedgerError::query)?;

        rows.iter().map(map_trade).collect()
    }
}
