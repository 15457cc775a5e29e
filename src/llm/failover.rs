//! Failover provider — tries each provider in order until one succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Wraps an ordered list of providers; the first is the primary.
pub struct FailoverProvider {
    providers: Vec<Arc<dyn LlmProvider>>,
}

impl FailoverProvider {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Result<Self, LlmError> {
        if providers.is_empty() {
            return Err(LlmError::NoProviders);
        }
        Ok(Self { providers })
    }
}

#[async_trait]
impl LlmProvider for FailoverProvider {
    fn model_name(&self) -> &str {
        self.providers
            .first()
            .map(|p| p.model_name())
            .unwrap_or("none")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut last_err = LlmError::NoProviders;
        for (i, provider) in self.providers.iter().enumerate() {
            match provider.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let next = self.providers.get(i + 1).map(|p| p.model_name());
                    warn!(
                        model = provider.model_name(),
                        next_model = ?next,
                        error = %e,
                        "LLM provider failed"
                    );
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }
}
