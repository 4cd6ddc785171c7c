//! Spend accounting across every completion made through a wrapped client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use moneta_common::Result;
use tracing::debug;

use crate::client::{estimate_cost, LlmClient, LlmRequest, LlmResponse};

/// Wraps an [`LlmClient`] and totals the estimated USD cost of successful
/// calls.
///
/// The running total is held in whole microdollars so concurrent callers can
/// add to it without a lock. Calls against unpriced models pass through
/// without affecting the total.
pub struct CostTrackingClient {
    inner: Arc<dyn LlmClient>,
    spent_microusd: AtomicU64,
}

impl CostTrackingClient {
    pub fn new(inner: Arc<dyn LlmClient>) -> Self {
        Self {
            inner,
            spent_microusd: AtomicU64::new(0),
        }
    }

    /// Estimated spend since construction or the last [`Self::drain_spent`].
    pub fn spent_usd(&self) -> f64 {
        self.spent_microusd.load(Ordering::Relaxed) as f64 / 1e6
    }

    /// Returns the accumulated spend and resets the counter.
    pub fn drain_spent(&self) -> f64 {
        self.spent_microusd.swap(0, Ordering::Relaxed) as f64 / 1e6
    }
}

#[async_trait]
impl LlmClient for CostTrackingClient {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let response = self.inner.complete(request).await?;
        if let Some(usage) = &response.usage {
            if let Some(cost) = estimate_cost(&response.model, usage) {
                let microusd = (cost * 1e6).round() as u64;
                self.spent_microusd.fetch_add(microusd, Ordering::Relaxed);
                debug!(
                    model = %response.model,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    cost_usd = cost,
                    "Completion cost"
                );
            }
        }
        Ok(response)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
