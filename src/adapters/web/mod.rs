//! Web server adapter.
//!
//! JSON REST API over the trade lifecycle engine, the live rate proxy and an
//! optional static front-end directory.

mod error;
mod handlers;

pub use error::WebError;
pub use handlers::*;

use axum::{
    Router,
    routing::{delete, get, put},
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::ports::export_port::ExportPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::rate_port::RatePort;

pub struct AppState {
    pub ledger: Arc<dyn LedgerPort + Send + Sync>,
    pub rates: Arc<dyn RatePort>,
    pub exporter: Arc<dyn ExportPort + Send + Sync>,
}

/// Routes mounted under `/api`.
fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/transactions",
            get(handlers::list_transactions).post(handlers::create_transaction),
        )
        .route("/transactions/export", get(handlers::export_transactions))
        .route("/transactions/{id}/sell", put(handlers::sell_transaction))
        .route("/transactions/{id}", delete(handlers::delete_transaction))
        .route("/exchange/rates", get(handlers::exchange_rates))
}

/// Server options read from the `[web]` config section.
#[derive(Debug, Clone)]
pub struct WebOptions {
    /// Front-end files served for any path outside `/api`.
    pub static_dir: Option<PathBuf>,
    pub cors: bool,
}

impl Default for WebOptions {
    fn default() -> Self {
        Self {
            static_dir: None,
            cors: true,
        }
    }
}

pub fn build_router(state: AppState, options: WebOptions) -> Router {
    let router = Router::new().nest("/api", api_router());

    let router = match options.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(handlers::not_found),
    };

    let router = if options.cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
