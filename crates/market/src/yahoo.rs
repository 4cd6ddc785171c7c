//! Quote lookups against Yahoo Finance's public chart endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{MarketError, QuoteProvider};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Deserialize)]
struct ChartMeta {
    symbol: String,
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

pub struct YahooQuoteClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl YahooQuoteClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            base_url,
            http_client: reqwest::Client::new(),
        }
    }

    fn extract_price(symbol: &str, response: ChartResponse) -> Result<f64, MarketError> {
        let result = response
            .chart
            .result
            .and_then(|mut results| {
                if results.is_empty() {
                    None
                } else {
                    Some(results.remove(0))
                }
            })
            .ok_or_else(|| MarketError::UnknownSymbol(symbol.to_string()))?;

        let price = result
            .meta
            .regular_market_price
            .ok_or_else(|| MarketError::UnknownSymbol(symbol.to_string()))?;
        if price <= 0.0 {
            return Err(MarketError::InvalidPrice {
                symbol: symbol.to_string(),
                price,
            });
        }

        debug!(symbol = %result.meta.symbol, price, "Fetched market quote");
        Ok(price)
    }
}

impl Default for YahooQuoteClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuoteProvider for YahooQuoteClient {
    async fn price(&self, symbol: &str) -> Result<f64, MarketError> {
        let url = format!("{}/v8/finance/chart/{symbol}", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketError::Http(format!("quote request for {symbol} failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MarketError::UnknownSymbol(symbol.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Http(format!(
                "quote request for {symbol} returned {status}: {body}"
            )));
        }

        let payload: ChartResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Parse(e.to_string()))?;
        Self::extract_price(symbol, payload)
    }
}
