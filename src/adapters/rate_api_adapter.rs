//! HTTP client for the upstream KRW exchange rate API.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::currency::Currency;
use crate::domain::error::LedgerError;
use crate::ports::config_port::ConfigPort;
use crate::ports::rate_port::{RatePort, RateSnapshot};

pub const DEFAULT_RATES_URL: &str = "https://api.manana.kr/exchange/rate/KRW/USD,JPY,EUR.json";

/// One entry of the upstream response, e.g. `{"name": "USDKRW=X", "rate": 1361.5}`.
#[derive(Debug, Deserialize)]
struct RateEntry {
    name: String,
    rate: f64,
}

pub struct RateApiAdapter {
    client: reqwest::Client,
    url: String,
}

impl RateApiAdapter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Upstream {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, LedgerError> {
        let url = config
            .get_string("rates", "url")
            .unwrap_or_else(|| DEFAULT_RATES_URL.to_string());
        let timeout_secs = config.get_int("rates", "timeout_secs", 10);
        if timeout_secs <= 0 {
            return Err(LedgerError::ConfigInvalid {
                section: "rates".into(),
                key: "timeout_secs".into(),
                reason: "must be a positive number of seconds".into(),
            });
        }
        Self::new(url, Duration::from_secs(timeout_secs as u64))
    }
}

fn ticker_currency(name: &str) -> Option<Currency> {
    match name {
        "USDKRW=X" => Some(Currency::Usd),
        "JPYKRW=X" => Some(Currency::Jpy),
        "EURKRW=X" => Some(Currency::Eur),
        _ => None,
    }
}

/// Maps upstream ticker entries to per-unit rates. Unknown tickers are ignored.
pub fn parse_rates(body: &str) -> Result<BTreeMap<Currency, Decimal>, LedgerError> {
    let entries: Vec<RateEntry> = serde_json::from_str(body).map_err(|e| LedgerError::Upstream {
        reason: format!("unexpected rate API response: {e}"),
    })?;

    let mut rates = BTreeMap::new();
    for entry in entries {
        let Some(currency) = ticker_currency(&entry.name) else {
            continue;
        };
        let rate = Decimal::from_f64(entry.rate).ok_or_else(|| LedgerError::Upstream {
            reason: format!("invalid rate for {}: {}", entry.name, entry.rate),
        })?;
        rates.insert(currency, rate);
    }
    Ok(rates)
}

#[async_trait]
impl RatePort for RateApiAdapter {
    async fn fetch_rates(&self) -> Result<RateSnapshot, LedgerError> {
        let upstream = |e: reqwest::Error| LedgerError::Upstream {
            reason: e.to_string(),
        };

        let response = self.client.get(&self.url).send().await.map_err(upstream)?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, url = %self.url, "rate API returned an error status");
            return Err(LedgerError::Upstream {
                reason: format!("rate API request failed with status {status}"),
            });
        }

        let body = response.text().await.map_err(upstream)?;
        let rates = parse_rates(&body)?;
        tracing::debug!(count = rates.len(), "fetched live rates");

        Ok(RateSnapshot {
            rates,
            fetched_at: Utc::now(),
        })
    }
}
