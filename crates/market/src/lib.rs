//! Market price lookups for Moneta.
//!
//! The [`QuoteProvider`] trait hands the agent a current price per symbol.
//! [`YahooQuoteClient`] asks Yahoo Finance's public chart endpoint;
//! [`FixedQuoteProvider`] serves a static quote table for tests and dry
//! runs. Prices must be positive; a zero or negative quote is rejected at
//! the source rather than poisoning the portfolio.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use moneta_common::MonetaError;

pub mod yahoo;

pub use yahoo::YahooQuoteClient;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("quote request failed: {0}")]
    Http(String),

    #[error("no quote available for symbol {0}")]
    UnknownSymbol(String),

    #[error("invalid market price {price:.2} for symbol {symbol}")]
    InvalidPrice { symbol: String, price: f64 },

    #[error("unreadable quote payload: {0}")]
    Parse(String),
}

impl From<MarketError> for MonetaError {
    fn from(err: MarketError) -> Self {
        MonetaError::Market(err.to_string())
    }
}

/// Source of current per-share prices.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// The current price for `symbol`, guaranteed positive.
    async fn price(&self, symbol: &str) -> Result<f64, MarketError>;
}

#[async_trait]
impl QuoteProvider for Box<dyn QuoteProvider> {
    async fn price(&self, symbol: &str) -> Result<f64, MarketError> {
        (**self).price(symbol).await
    }
}

/// Serves quotes from a fixed table. Unlisted symbols are unknown.
#[derive(Debug, Clone, Default)]
pub struct FixedQuoteProvider {
    quotes: HashMap<String, f64>,
}

impl FixedQuoteProvider {
    pub fn new(quotes: HashMap<String, f64>) -> Self {
        Self { quotes }
    }

    pub fn with_quote(mut self, symbol: impl Into<String>, price: f64) -> Self {
        self.quotes.insert(symbol.into(), price);
        self
    }
}

#[async_trait]
impl QuoteProvider for FixedQuoteProvider {
    async fn price(&self, symbol: &str) -> Result<f64, MarketError> {
        let price = *self
            .quotes
            .get(symbol)
            .ok_or_else(|| MarketError::UnknownSymbol(symbol.to_string()))?;
        if price <= 0.0 {
            return Err(MarketError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }
        Ok(price)
    }
}
