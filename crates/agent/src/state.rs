//! Durable per-agent state: one YAML file next to the portfolio and the
//! memory stores, all inside the agent's directory.

use std::path::Path;

use chrono::{DateTime, Utc};
use moneta_common::{MonetaError, Portfolio, Result};
use moneta_llm::LlmConfig;
use moneta_memory::EmbedderConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// State file name inside an agent directory.
pub const STATE_FILE: &str = "agent_state.yaml";
/// Portfolio file name inside an agent directory.
pub const PORTFOLIO_FILE: &str = "portfolio.json";

/// Counters carried across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    #[serde(default)]
    pub runs: u64,
    #[serde(default)]
    pub total_trades: u64,
    #[serde(default)]
    pub finished_episodes: u64,
    #[serde(default)]
    pub llm_cost_usd: f64,
    #[serde(default)]
    pub portfolio_value: f64,
}

/// Configuration and metrics for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    /// Tickers the agent follows and may trade.
    pub symbols: Vec<String>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbedderConfig,
    /// Name passed to `build_news_provider`.
    #[serde(default = "default_news_provider")]
    pub news_provider: String,
    #[serde(default)]
    pub metrics: AgentMetrics,
}

fn default_news_provider() -> String {
    "newsapi".to_string()
}

impl AgentState {
    /// Sets up a fresh agent directory: a state file plus a portfolio funded
    /// with `starting_cash`. Refuses to overwrite an existing agent.
    pub fn create(
        dir: &Path,
        name: &str,
        starting_cash: f64,
        symbols: Vec<String>,
    ) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        if dir.join(STATE_FILE).exists() {
            return Err(MonetaError::Config(format!(
                "agent directory {} already holds a state file",
                dir.display()
            )));
        }

        let mut portfolio = Portfolio::new();
        portfolio.deposit(starting_cash)?;
        portfolio.to_file(&dir.join(PORTFOLIO_FILE))?;

        let state = Self {
            name: name.to_string(),
            created_at: Utc::now(),
            last_run: None,
            symbols,
            llm: LlmConfig::default(),
            embedding: EmbedderConfig::default(),
            news_provider: default_news_provider(),
            metrics: AgentMetrics {
                portfolio_value: starting_cash,
                ..AgentMetrics::default()
            },
        };
        state.save(dir)?;
        info!(name, dir = %dir.display(), cash = starting_cash, "Created agent");
        Ok(state)
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(STATE_FILE);
        let yaml = std::fs::read_to_string(&path)?;
        serde_yaml::from_str(&yaml).map_err(|e| {
            MonetaError::Config(format!("unreadable state file {}: {e}", path.display()))
        })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| MonetaError::Config(format!("state serialization failed: {e}")))?;
        std::fs::write(dir.join(STATE_FILE), yaml)?;
        Ok(())
    }
}
