//! HTTP error responses for web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::domain::error::LedgerError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

pub fn status_from_error(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Validation { .. } | LedgerError::AlreadyClosed { .. } => {
            StatusCode::BAD_REQUEST
        }
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::Upstream { .. }
        | LedgerError::Database { .. }
        | LedgerError::DatabaseQuery { .. }
        | LedgerError::ConfigParse { .. }
        | LedgerError::ConfigMissing { .. }
        | LedgerError::ConfigInvalid { .. }
        | LedgerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LedgerError> for WebError {
    fn from(err: LedgerError) -> Self {
        let status = status_from_error(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
