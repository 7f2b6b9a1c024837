//! Domain error types.

use super::trade::TradeId;

/// Top-level error type for fxledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{reason}")]
    Validation { reason: String },

    #[error("trade {id} not found")]
    NotFound { id: TradeId },

    #[error("trade {id} is already closed")]
    AlreadyClosed { id: TradeId },

    #[error("{reason}")]
    Upstream { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub fn validation(reason: impl Into<String>) -> Self {
        LedgerError::Validation {
            reason: reason.into(),
        }
    }

    pub fn database(err: impl std::fmt::Display) -> Self {
        LedgerError::Database {
            reason: err.to_string(),
        }
    }

    pub fn query(err: impl std::fmt::Display) -> Self {
        LedgerError::DatabaseQuery {
            reason: err.to_string(),
        }
    }
}

impl From<&LedgerError> for std::process::ExitCode {
    fn from(err: &LedgerError) -> Self {
        let code: u8 = match err {
            LedgerError::Io(_) => 1,
            LedgerError::ConfigParse { .. }
            | LedgerError::ConfigMissing { .. }
            | LedgerError::ConfigInvalid { .. } => 2,
            LedgerError::Database { .. } | LedgerError::DatabaseQuery { .. } => 3,
            LedgerError::Validation { .. }
            | LedgerError::NotFound { .. }
            | LedgerError::AlreadyClosed { .. } => 4,
            LedgerError::Upstream { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
