//! LLM access for Moneta.
//!
//! A provider-agnostic [`LlmClient`] trait, the OpenAI chat-completions
//! backend, transparent retries and per-model cost estimation. Clients are
//! built once from [`LlmConfig`] and injected wherever text generation is
//! needed.

pub mod client;
pub mod config;
pub mod cost;
pub mod openai;
pub mod retry;

pub use client::{
    estimate_cost, ChatMessage, LlmClient, LlmRequest, LlmResponse, Role, TokenUsage,
    DEFAULT_SYSTEM_PROMPT,
};
pub use config::{build_llm_client, LlmConfig, API_KEY_ENV};
pub use cost::CostTrackingClient;
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};
