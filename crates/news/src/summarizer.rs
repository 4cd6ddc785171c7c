//! Condenses a day's articles into a short investment briefing.

use std::sync::Arc;

use chrono::NaiveDate;
use moneta_llm::{estimate_cost, LlmClient, LlmRequest, DEFAULT_SYSTEM_PROMPT};
use tracing::{debug, info};

use crate::NewsProvider;

/// Fetches a day of coverage on a topic and summarizes it through the LLM.
///
/// Days without coverage produce a fixed no-news line and never reach the
/// LLM.
pub struct NewsSummarizer {
    provider: Box<dyn NewsProvider>,
    llm: Arc<dyn LlmClient>,
}

fn summary_prompt(topic: &str) -> String {
    format!(
        "Given this partially incomplete list of articles (or article stubs) on the keyword \
         '{topic}', write a summary on the news. Make sure to keep the relevant numbers and \
         facts intact. Focus in particular on novel potential investment opportunities and \
         impending risks if (and only if) such are mentioned. Do stick true to the source \
         material. Make sure to always point out the relevant stock symbols (e.g. AAPL, \
         GOOGL, etc.)\n\n"
    )
}

impl NewsSummarizer {
    pub fn new(provider: Box<dyn NewsProvider>, llm: Arc<dyn LlmClient>) -> Self {
        Self { provider, llm }
    }

    /// Summary of the news published around `date` on `topic`.
    pub async fn daily_summary(
        &self,
        topic: &str,
        date: NaiveDate,
    ) -> moneta_common::Result<String> {
        let Some(digest) = self.provider.daily_articles(topic, date).await? else {
            info!(topic, %date, "No articles published, skipping summarization");
            return Ok(format!(
                "Today ({}) there were no news on the topic '{topic}'",
                date.format("%Y-%m-%d")
            ));
        };

        let prompt = format!("{}{digest}", summary_prompt(topic));
        let response = self
            .llm
            .complete(LlmRequest::user(prompt).with_system(DEFAULT_SYSTEM_PROMPT))
            .await?;

        if let Some(usage) = &response.usage {
            if let Some(cost) = estimate_cost(&response.model, usage) {
                debug!(
                    topic,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    cost_usd = cost,
                    "Summarized news"
                );
            }
        }
        Ok(response.content)
    }
}
