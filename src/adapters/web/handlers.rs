//! HTTP request handlers for web adapter.
//!
//! Rates arriving in request bodies are per-unit (per 1 yen for JPY). The
//! `display_*` fields are output only.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use chrono::{NaiveDate, NaiveDateTime, SecondsFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::currency::{Currency, RateQuote};
use crate::domain::ledger::{self, BuyOrder, local_now};
use crate::domain::trade::{Trade, TradeId};
use crate::ports::export_port::ExportPort;
use crate::ports::rate_port::RatePort;

use super::{AppState, WebError};

#[derive(Debug, Deserialize)]
pub struct BuyRequest {
    pub currency: Option<String>,
    pub buy_amount: Option<Decimal>,
    pub buy_rate: Option<Decimal>,
    pub memo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SellRequest {
    pub sell_rate: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CurrencyQuery {
    pub currency: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: TradeId,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SoldResponse {
    pub message: &'static str,
    pub profit: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Flat JSON shape of a trade. Open trades carry `null` sell fields.
#[derive(Debug, Serialize)]
pub struct TradeView {
    pub id: TradeId,
    pub currency: Currency,
    pub status: &'static str,
    pub buy_date: NaiveDate,
    pub buy_amount: Decimal,
    pub buy_rate: Decimal,
    pub buy_local: Decimal,
    pub display_buy_rate: Decimal,
    pub sell_date: Option<NaiveDate>,
    pub sell_rate: Option<Decimal>,
    pub sell_local: Option<Decimal>,
    pub display_sell_rate: Option<Decimal>,
    pub profit: Option<Decimal>,
    pub memo: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<&Trade> for TradeView {
    fn from(trade: &Trade) -> Self {
        let settlement = trade.settlement();
        TradeView {
            id: trade.id,
            currency: trade.currency,
            status: if trade.is_open() { "open" } else { "closed" },
            buy_date: trade.buy_date,
            buy_amount: trade.buy_amount,
            buy_rate: trade.buy_rate,
            buy_local: trade.buy_local,
            display_buy_rate: trade.display_buy_rate(),
            sell_date: settlement.map(|s| s.sell_date),
            sell_rate: settlement.map(|s| s.sell_rate),
            sell_local: settlement.map(|s| s.sell_local),
            display_sell_rate: trade.display_sell_rate(),
            profit: settlement.map(|s| s.profit),
            memo: trade.memo.clone(),
            created_at: trade.created_at,
        }
    }
}

fn trade_id(path: Result<Path<TradeId>, PathRejection>) -> Result<TradeId, WebError> {
    path.map(|Path(id)| id)
        .map_err(|e| WebError::bad_request(e.body_text()))
}

/// # GET /api/transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CurrencyQuery>,
) -> Result<Json<Vec<TradeView>>, WebError> {
    let trades = ledger::list_trades(&*state.ledger, query.currency.as_deref())?;
    Ok(Json(trades.iter().map(TradeView::from).collect()))
}

/// # POST /api/transactions
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BuyRequest>, JsonRejection>,
) -> Result<Json<CreatedResponse>, WebError> {
    let Json(req) = payload.map_err(|e| WebError::bad_request(e.body_text()))?;

    let order = BuyOrder::new(
        req.currency.as_deref(),
        req.buy_amount,
        req.buy_rate.map(RateQuote::PerUnit),
        req.memo,
    )?;
    let trade = ledger::open_trade(&*state.ledger, order, local_now())?;

    Ok(Json(CreatedResponse {
        id: trade.id,
        message: "Purchase recorded.",
    }))
}

/// # PUT /api/transactions/{id}/sell
pub async fn sell_transaction(
    State(state): State<Arc<AppState>>,
    path: Result<Path<TradeId>, PathRejection>,
    payload: Result<Json<SellRequest>, JsonRejection>,
) -> Result<Json<SoldResponse>, WebError> {
    let id = trade_id(path)?;
    let Json(req) = payload.map_err(|e| WebError::bad_request(e.body_text()))?;

    let settlement = ledger::close_trade(
        &*state.ledger,
        id,
        req.sell_rate.map(RateQuote::PerUnit),
        local_now().date(),
    )?;

    Ok(Json(SoldResponse {
        message: "Sale recorded.",
        profit: settlement.profit,
    }))
}

/// # DELETE /api/transactions/{id}
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    path: Result<Path<TradeId>, PathRejection>,
) -> Result<Json<MessageResponse>, WebError> {
    let id = trade_id(path)?;
    ledger::delete_trade(&*state.ledger, id)?;
    Ok(Json(MessageResponse {
        message: "Trade deleted.",
    }))
}

/// # GET /api/transactions/export
pub async fn export_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CurrencyQuery>,
) -> Result<Response, WebError> {
    let trades = ledger::list_trades(&*state.ledger, query.currency.as_deref())?;
    let body = state.exporter.render(&trades)?;

    let scope = Currency::parse_filter(query.currency.as_deref()).and_then(Result::ok);
    let file_name = state.exporter.file_name(scope, local_now());

    Ok((
        [
            (header::CONTENT_TYPE, state.exporter.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={file_name}"),
            ),
        ],
        body,
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct RatesResponse {
    pub success: bool,
    pub rates: BTreeMap<&'static str, Decimal>,
    pub display_rates: BTreeMap<&'static str, Decimal>,
    pub timestamp: String,
}

/// # GET /api/exchange/rates
///
/// Pass-through to the upstream API; no caching.
pub async fn exchange_rates(State(state): State<Arc<AppState>>) -> Response {
    match state.rates.fetch_rates().await {
        Ok(snapshot) => {
            let by_code = |rates: BTreeMap<Currency, Decimal>| -> BTreeMap<&'static str, Decimal> {
                rates
                    .into_iter()
                    .map(|(currency, rate)| (currency.code(), rate))
                    .collect()
            };
            Json(RatesResponse {
                success: true,
                display_rates: by_code(snapshot.display_rates()),
                rates: by_code(snapshot.rates),
                timestamp: snapshot
                    .fetched_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            })
            .into_response()
        }
        Err(err) => {
            tracing::error!(error = %err, "rate lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": err.to_string() })),
            )
                .into_response()
        }
    }
}

pub async fn not_found(uri: Uri) -> WebError {
    WebError::not_found(format!("no route for {}", uri.path()))
}
