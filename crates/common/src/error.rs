//! Error types for Moneta.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonetaError {
    #[error("Agent error: {0}")]
    Agent(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Market data error: {0}")]
    Market(String),

    #[error("News error: {0}")]
    News(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MonetaError>;
