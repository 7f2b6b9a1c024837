//! Core domain types and the trade lifecycle engine.

pub mod currency;
pub mod error;
pub mod ledger;
pub mod trade;
