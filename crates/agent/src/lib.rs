//! The Moneta trading agent.
//!
//! Binds portfolio, market quotes, news summaries, and episodic memory into
//! a two-phase loop: reflect on the previous run's decision now that its
//! outcome is observable, then take today's decision and park it as the next
//! pending episode.

pub mod decision;
pub mod prompts;
pub mod runner;
pub mod state;

pub use decision::{
    execute_command, extract_json_object, parse_reflection, parse_trade_command,
    ReflectionNotes, TradeCommand,
};
pub use runner::{TradingAgent, RETRIEVAL_K};
pub use state::{AgentMetrics, AgentState, PORTFOLIO_FILE, STATE_FILE};
