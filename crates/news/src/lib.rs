//! News retrieval and summarization.
//!
//! A [`NewsProvider`] fetches the raw articles published around a given date
//! for a topic and concatenates them into a plain-text digest. The
//! [`NewsSummarizer`](summarizer::NewsSummarizer) then condenses that digest
//! into a short investment-focused briefing through the LLM, skipping the
//! call entirely on days without coverage.

pub mod provider;
pub mod summarizer;

use async_trait::async_trait;
use chrono::NaiveDate;
use moneta_common::MonetaError;
use thiserror::Error;

pub use provider::{build_news_provider, NewsApiClient, WorldNewsClient};
pub use summarizer::NewsSummarizer;

/// Errors surfaced by news providers.
#[derive(Debug, Error)]
pub enum NewsError {
    #[error("news request failed: {0}")]
    Http(String),

    #[error("news API rejected the request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unreadable news payload: {0}")]
    Parse(String),

    #[error("no API key configured, set the {0} environment variable")]
    MissingApiKey(&'static str),

    #[error("unknown news provider: {0}")]
    UnknownProvider(String),
}

impl From<NewsError> for MonetaError {
    fn from(err: NewsError) -> Self {
        MonetaError::News(err.to_string())
    }
}

/// A source of dated news coverage on a topic.
///
/// Implementations return the articles published in the one-day window
/// around `date`, already rendered into a plain-text digest. `Ok(None)`
/// means the provider answered but had no articles for that day.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn daily_articles(
        &self,
        topic: &str,
        date: NaiveDate,
    ) -> Result<Option<String>, NewsError>;
}

// `Result<Box<dyn NewsProvider>, _>::unwrap_err` needs the success type to
// be `Debug`.
impl std::fmt::Debug for dyn NewsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NewsProvider")
    }
}

#[async_trait]
impl NewsProvider for Box<dyn NewsProvider> {
    async fn daily_articles(
        &self,
        topic: &str,
        date: NaiveDate,
    ) -> Result<Option<String>, NewsError> {
        self.as_ref().daily_articles(topic, date).await
    }
}
