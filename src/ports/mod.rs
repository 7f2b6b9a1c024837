//! Port traits the domain is driven through.

pub mod config_port;
pub mod export_port;
pub mod ledger_port;
pub mod rate_port;
