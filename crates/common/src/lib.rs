//! Shared types for Moneta: the error enum used across crates and the
//! portfolio ledger that every component reads or writes.

pub mod error;
pub mod portfolio;

pub use error::{MonetaError, Result};
pub use portfolio::{
    Portfolio, PortfolioError, Position, TradeSide, Transaction, TransactionHistory,
};
