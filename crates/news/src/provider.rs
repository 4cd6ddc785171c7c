//! HTTP providers for NewsAPI.org and World News API.
//!
//! Both providers query a one-day window around the requested date and
//! flatten the returned articles into the plain-text digest the summarizer
//! feeds to the LLM. Missing article fields render as `None` so a partially
//! populated article still contributes its known parts.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use crate::{NewsError, NewsProvider};

const NEWS_API_BASE_URL: &str = "https://newsapi.org";
const WORLD_NEWS_BASE_URL: &str = "https://api.worldnewsapi.com";

/// Environment variable holding the NewsAPI.org key.
pub const NEWS_API_KEY_ENV: &str = "NEWS_API_KEY";
/// Environment variable holding the World News API key.
pub const WORLD_NEWS_API_KEY_ENV: &str = "WORLD_NEWS_API_KEY";

/// Builds the provider named in the agent configuration.
///
/// `api_key` takes precedence over the provider's environment variable when
/// present.
pub fn build_news_provider(
    provider: &str,
    api_key: Option<String>,
) -> Result<Box<dyn NewsProvider>, NewsError> {
    match provider {
        "newsapi" => Ok(Box::new(NewsApiClient::new(api_key)?)),
        "worldnews" => Ok(Box::new(WorldNewsClient::new(api_key)?)),
        other => Err(NewsError::UnknownProvider(other.to_string())),
    }
}

fn resolve_key(
    explicit: Option<String>,
    env_var: &'static str,
) -> Result<String, NewsError> {
    if let Some(key) = explicit {
        if !key.is_empty() {
            return Ok(key);
        }
    }
    std::env::var(env_var)
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or(NewsError::MissingApiKey(env_var))
}

/// One-day window around `date`, formatted for query parameters.
fn publish_window(date: NaiveDate) -> (String, String) {
    let yesterday = date - Days::new(1);
    let tomorrow = date + Days::new(1);
    (
        yesterday.format("%Y-%m-%d").to_string(),
        tomorrow.format("%Y-%m-%d").to_string(),
    )
}

#[derive(Deserialize)]
struct EverythingResponse {
    status: String,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Deserialize)]
struct NewsApiArticle {
    source: NewsApiSource,
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

/// Client for the NewsAPI.org `/v2/everything` endpoint.
pub struct NewsApiClient {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl NewsApiClient {
    pub fn new(api_key: Option<String>) -> Result<Self, NewsError> {
        Ok(Self {
            base_url: NEWS_API_BASE_URL.to_string(),
            api_key: resolve_key(api_key, NEWS_API_KEY_ENV)?,
            http_client: reqwest::Client::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn format_articles(articles: &[NewsApiArticle]) -> String {
        let mut digest = String::new();
        for article in articles {
            digest.push_str(&format!(
                "{}: {}\n{}\n{}\n\n",
                article.source.name.as_deref().unwrap_or("None"),
                article.published_at.as_deref().unwrap_or("None"),
                article.title.as_deref().unwrap_or("None"),
                article.description.as_deref().unwrap_or("None"),
            ));
        }
        digest
    }
}

#[async_trait]
impl NewsProvider for NewsApiClient {
    async fn daily_articles(
        &self,
        topic: &str,
        date: NaiveDate,
    ) -> Result<Option<String>, NewsError> {
        let (from, to) = publish_window(date);
        let url = format!("{}/v2/everything", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", topic),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("language", "en"),
                ("sortBy", "relevancy"),
            ])
            .send()
            .await
            .map_err(|e| NewsError::Http(format!("news request for '{topic}' failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NewsError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let payload: EverythingResponse = response
            .json()
            .await
            .map_err(|e| NewsError::Parse(e.to_string()))?;
        if payload.status != "ok" {
            return Err(NewsError::Api {
                status: status.as_u16(),
                message: payload
                    .message
                    .unwrap_or_else(|| format!("status '{}'", payload.status)),
            });
        }

        debug!(topic, articles = payload.articles.len(), "Fetched NewsAPI articles");
        if payload.articles.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::format_articles(&payload.articles)))
    }
}

#[derive(Deserialize)]
struct SearchNewsResponse {
    #[serde(default)]
    news: Vec<WorldNewsArticle>,
}

#[derive(Deserialize)]
struct WorldNewsArticle {
    title: Option<String>,
    summary: Option<String>,
    text: Option<String>,
    publish_date: Option<String>,
}

/// Client for the World News API `/search-news` endpoint.
pub struct WorldNewsClient {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl WorldNewsClient {
    pub fn new(api_key: Option<String>) -> Result<Self, NewsError> {
        Ok(Self {
            base_url: WORLD_NEWS_BASE_URL.to_string(),
            api_key: resolve_key(api_key, WORLD_NEWS_API_KEY_ENV)?,
            http_client: reqwest::Client::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn format_articles(articles: &[WorldNewsArticle]) -> String {
        let mut digest = String::new();
        for article in articles {
            digest.push_str(&format!(
                "{}: {}\n{}\n{}\n\n",
                article.title.as_deref().unwrap_or("None"),
                article.publish_date.as_deref().unwrap_or("None"),
                article.summary.as_deref().unwrap_or("None"),
                article.text.as_deref().unwrap_or("None"),
            ));
        }
        digest
    }
}

#[async_trait]
impl NewsProvider for WorldNewsClient {
    async fn daily_articles(
        &self,
        topic: &str,
        date: NaiveDate,
    ) -> Result<Option<String>, NewsError> {
        let (earliest, latest) = publish_window(date);
        let url = format!("{}/search-news", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&[
                ("text", topic),
                ("language", "en"),
                ("earliest-publish-date", earliest.as_str()),
                ("latest-publish-date", latest.as_str()),
                ("sort", "publish-time"),
                ("sort-direction", "desc"),
                ("number", "10"),
            ])
            .send()
            .await
            .map_err(|e| NewsError::Http(format!("news request for '{topic}' failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NewsError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let payload: SearchNewsResponse = response
            .json()
            .await
            .map_err(|e| NewsError::Parse(e.to_string()))?;

        debug!(topic, articles = payload.news.len(), "Fetched World News articles");
        if payload.news.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::format_articles(&payload.news)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVERYTHING_PAYLOAD: &str = r#"{
        "status": "ok",
        "totalResults": 2,
        "articles": [
            {
                "source": {"id": "reuters", "name": "Reuters"},
                "author": "Jane Doe",
                "title": "Chipmaker beats earnings estimates",
                "description": "Quarterly revenue rose 12% on data-center demand.",
                "url": "https://example.com/a",
                "publishedAt": "2024-01-21T09:15:00Z"
            },
            {
                "source": {"id": null, "name": "Example Wire"},
                "author": null,
                "title": "Fab expansion announced",
                "description": null,
                "url": "https://example.com/b",
                "publishedAt": "2024-01-21T11:40:00Z"
            }
        ]
    }"#;

    const SEARCH_NEWS_PAYLOAD: &str = r#"{
        "offset": 0,
        "number": 10,
        "available": 1,
        "news": [
            {
                "id": 12345,
                "title": "Chipmaker beats earnings estimates",
                "text": "The company reported record quarterly revenue.",
                "summary": "Earnings above consensus.",
                "url": "https://example.com/a",
                "publish_date": "2024-01-21 09:15:00",
                "language": "en"
            }
        ]
    }"#;

    #[test]
    fn formats_newsapi_articles_in_order() {
        let payload: EverythingResponse = serde_json::from_str(EVERYTHING_PAYLOAD).unwrap();
        let digest = NewsApiClient::format_articles(&payload.articles);

        assert!(digest.starts_with(
            "Reuters: 2024-01-21T09:15:00Z\n\
             Chipmaker beats earnings estimates\n\
             Quarterly revenue rose 12% on data-center demand.\n\n"
        ));
        assert!(digest.ends_with(
            "Example Wire: 2024-01-21T11:40:00Z\n\
             Fab expansion announced\n\
             None\n\n"
        ));
    }

    #[test]
    fn formats_worldnews_articles() {
        let payload: SearchNewsResponse = serde_json::from_str(SEARCH_NEWS_PAYLOAD).unwrap();
        let digest = WorldNewsClient::format_articles(&payload.news);

        assert_eq!(
            digest,
            "Chipmaker beats earnings estimates: 2024-01-21 09:15:00\n\
             Earnings above consensus.\n\
             The company reported record quarterly revenue.\n\n"
        );
    }

    #[test]
    fn newsapi_error_status_is_detected() {
        let payload: EverythingResponse = serde_json::from_str(
            r#"{"status": "error", "code": "apiKeyInvalid", "message": "Your API key is invalid."}"#,
        )
        .unwrap();
        assert_eq!(payload.status, "error");
        assert_eq!(payload.message.as_deref(), Some("Your API key is invalid."));
        assert!(payload.articles.is_empty());
    }

    #[test]
    fn publish_window_spans_one_day_each_side() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 21).unwrap();
        let (from, to) = publish_window(date);
        assert_eq!(from, "2024-01-20");
        assert_eq!(to, "2024-01-22");
    }

    #[test]
    fn explicit_key_wins_over_environment() {
        let key = resolve_key(Some("configured-key".to_string()), "MONETA_TEST_UNSET_KEY");
        assert_eq!(key.unwrap(), "configured-key");
    }

    #[test]
    fn missing_key_names_the_environment_variable() {
        let err = resolve_key(None, "MONETA_TEST_UNSET_KEY").unwrap_err();
        assert!(matches!(
            err,
            NewsError::MissingApiKey("MONETA_TEST_UNSET_KEY")
        ));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = build_news_provider("bloomberg", Some("key".to_string())).unwrap_err();
        assert!(matches!(err, NewsError::UnknownProvider(name) if name == "bloomberg"));
    }
}
