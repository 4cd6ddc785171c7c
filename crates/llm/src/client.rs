use async_trait::async_trait;
use moneta_common::Result;
use serde::{Deserialize, Serialize};

/// System prompt applied to every completion the agent requests unless a
/// caller overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an autonomous stock-trading agent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    /// A request holding a single user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: Role::User,
                content: content.into(),
            }],
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
}

/// USD per million input and output tokens for the models the agent runs on.
const MODEL_PRICES: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.15, 0.6),
    ("gpt-4o", 2.5, 10.0),
    ("o1", 15.0, 60.0),
    ("o1-mini", 3.0, 12.0),
];

/// Estimates the USD cost of a completion, or `None` for an unpriced model.
pub fn estimate_cost(model: &str, usage: &TokenUsage) -> Option<f64> {
    let (_, input, output) = MODEL_PRICES.iter().find(|(name, _, _)| *name == model)?;
    Some(
        (f64::from(usage.prompt_tokens) * input + f64::from(usage.completion_tokens) * output)
            / 1_000_000.0,
    )
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse>;
    fn model_name(&self) -> &str;
}

#[async_trait]
impl LlmClient for Box<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        (**self).complete(request).await
    }
    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
