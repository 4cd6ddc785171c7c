//! The agent's run loop: revalue, reflect, decide, persist.
//!
//! One [`TradingAgent::run`] call performs a full cycle. The reflection
//! phase closes the pending episode from the previous run against the
//! portfolio's observed development; the decision phase gathers news,
//! recalls similar past episodes, asks the LLM for the next trade, executes
//! it, and parks the new episode in the pending slot for the next run to
//! judge.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use moneta_common::{Portfolio, Result};
use moneta_llm::{
    build_llm_client, CostTrackingClient, LlmClient, LlmRequest, LlmResponse,
    DEFAULT_SYSTEM_PROMPT,
};
use moneta_market::{QuoteProvider, YahooQuoteClient};
use moneta_memory::{
    build_embedder, Action, Embedder, Episode, Experience, MemoryController, MemoryError,
    Reflection,
};
use moneta_news::{build_news_provider, NewsProvider, NewsSummarizer};
use tracing::{info, instrument};

use crate::decision::{execute_command, parse_reflection, parse_trade_command};
use crate::prompts::{build_decision_prompt, build_reflection_prompt};
use crate::state::{AgentState, PORTFOLIO_FILE};

/// How many past episodes the decision prompt recalls.
pub const RETRIEVAL_K: usize = 3;

pub struct TradingAgent {
    dir: PathBuf,
    state: AgentState,
    portfolio: Portfolio,
    memory: MemoryController,
    llm: Arc<CostTrackingClient>,
    quotes: Box<dyn QuoteProvider>,
    news: NewsSummarizer,
}

impl TradingAgent {
    /// Assembles an agent from its directory using the providers named in
    /// the state file: OpenAI completions, Yahoo quotes, the configured
    /// news source, and the configured embedder.
    pub fn bootstrap(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let state = AgentState::load(&dir)?;
        let llm = build_llm_client(&state.llm)?;
        let embedder = build_embedder(&state.embedding).map_err(MemoryError::from)?;
        let quotes: Box<dyn QuoteProvider> = Box::new(YahooQuoteClient::new());
        let news_provider = build_news_provider(&state.news_provider, None)?;
        Self::with_dependencies(dir, llm, quotes, news_provider, embedder)
    }

    /// Assembles an agent from explicit collaborators. Tests inject fakes
    /// here; [`Self::bootstrap`] is the production path.
    pub fn with_dependencies(
        dir: impl Into<PathBuf>,
        llm: Arc<dyn LlmClient>,
        quotes: Box<dyn QuoteProvider>,
        news_provider: Box<dyn NewsProvider>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let dir = dir.into();
        let state = AgentState::load(&dir)?;
        let portfolio = Portfolio::from_file(&dir.join(PORTFOLIO_FILE))?;
        let memory = MemoryController::open(&dir, embedder)?;
        let llm = Arc::new(CostTrackingClient::new(llm));
        let news = NewsSummarizer::new(news_provider, llm.clone() as Arc<dyn LlmClient>);

        info!(
            agent = %state.name,
            dir = %dir.display(),
            episodes = memory.episode_count(),
            "Loaded agent"
        );
        Ok(Self {
            dir,
            state,
            portfolio,
            memory,
            llm,
            quotes,
            news,
        })
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// One full cycle: revalue the portfolio, reflect on the pending
    /// episode, take today's decision, persist everything.
    #[instrument(skip(self), fields(agent = %self.state.name))]
    pub async fn run(&mut self) -> Result<()> {
        let now = Utc::now();
        self.revalue().await?;
        self.reflect().await?;
        self.decide(now).await?;
        self.persist(now)?;
        info!(
            value = self.state.metrics.portfolio_value,
            episodes = self.state.metrics.finished_episodes,
            "Run complete"
        );
        Ok(())
    }

    /// Marks every held position to the current market.
    async fn revalue(&mut self) -> Result<()> {
        let symbols = self.portfolio.holdings();
        if symbols.is_empty() {
            return Ok(());
        }

        let mut quotes = HashMap::new();
        for symbol in &symbols {
            let price = self.quotes.price(symbol).await?;
            quotes.insert(symbol.clone(), price);
        }
        self.portfolio.revalue(&quotes)?;
        info!(
            positions = symbols.len(),
            value = self.portfolio.portfolio_value(),
            "Revalued portfolio"
        );
        Ok(())
    }

    /// Closes the pending episode from the previous run, if there is one.
    async fn reflect(&mut self) -> Result<()> {
        let Some(pending) = self.memory.get_pending()? else {
            info!("No pending episode to reflect on");
            return Ok(());
        };

        let prompt = build_reflection_prompt(&pending, &self.portfolio);
        let response = self.complete(prompt).await?;
        let notes = parse_reflection(&response.content)?;

        let posterior_position = pending
            .experience
            .action
            .as_ref()
            .and_then(|action| action.transaction.as_ref())
            .and_then(|transaction| self.portfolio.positions.get(&transaction.symbol))
            .cloned();
        let episode = pending.with_reflection(Reflection {
            posterior_position,
            expectation_evaluation: notes.evaluation,
            learning: notes.learning,
        });

        let id = self.memory.finalize(&episode).await?;
        self.state.metrics.finished_episodes += 1;
        info!(id, "Finalized reflected episode");
        Ok(())
    }

    /// Takes today's decision and parks it as the new pending episode.
    async fn decide(&mut self, now: DateTime<Utc>) -> Result<()> {
        let today = now.date_naive();
        let mut summaries = String::new();
        for symbol in &self.state.symbols {
            let summary = self.news.daily_summary(symbol, today).await?;
            summaries.push_str(&format!("{symbol}:\n{summary}\n\n"));
        }

        let query = Episode::new(Experience::new(now, summaries, self.portfolio.clone()));
        let memories = self.memory.retrieve_similar(&query, RETRIEVAL_K).await?;
        if let Some(hits) = &memories {
            info!(hits = hits.len(), "Recalled similar episodes");
        }

        let prompt = build_decision_prompt(
            now,
            &self.portfolio,
            &self.state.symbols,
            &query.experience.perception.news_text,
            memories.as_deref(),
        );
        let response = self.complete(prompt).await?;
        let command = parse_trade_command(&response.content)?;

        let (action_type, transaction, expectation) =
            execute_command(command, &mut self.portfolio, self.quotes.as_ref()).await?;
        if transaction.is_some() {
            self.state.metrics.total_trades += 1;
        }
        info!(action = %action_type, "Executed trading decision");

        let episode = Episode::new(query.experience.with_action(Action {
            action_type,
            transaction,
            expectation,
        }));
        self.memory.save_pending(&episode)?;
        Ok(())
    }

    /// Saves portfolio and state, folding this run into the metrics.
    fn persist(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.portfolio.to_file(&self.dir.join(PORTFOLIO_FILE))?;
        self.state.metrics.runs += 1;
        self.state.metrics.portfolio_value = self.portfolio.portfolio_value();
        self.state.metrics.llm_cost_usd += self.llm.drain_spent();
        self.state.last_run = Some(now);
        self.state.save(&self.dir)?;
        Ok(())
    }

    async fn complete(&self, prompt: String) -> Result<LlmResponse> {
        self.llm
            .complete(LlmRequest::user(prompt).with_system(DEFAULT_SYSTEM_PROMPT))
            .await
    }
}
