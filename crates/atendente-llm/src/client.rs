// SPDX-FileCopyrightText: 2026 Atendente Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation calls with retry and safety-filter handling.

use std::sync::Arc;

use atendente_core::AtendenteError;
use atendente_core::traits::ProviderAdapter;
use atendente_core::types::{
    FinishReason, GenerateRequest, ProviderResponse, ToolDefinition, Turn,
};
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

/// Returned instead of the provider's text when its safety filter fired.
pub const SAFETY_FALLBACK_TEXT: &str =
    "Desculpe, não consigo responder a essa mensagem. Posso ajudar com outra dúvida?";

/// Wraps a generative provider with the retry policy.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn ProviderAdapter>,
    policy: RetryPolicy,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn ProviderAdapter>, policy: RetryPolicy) -> Self {
        Self { provider, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Issues one generation, retrying transient failures with backoff.
    ///
    /// Terminal errors and exhausted retries are returned to the caller.
    /// A safety-filtered response comes back as [`SAFETY_FALLBACK_TEXT`]
    /// with no tool calls.
    pub async fn generate(
        &self,
        system_prompt: &str,
        history: &[Turn],
        tools: &[ToolDefinition],
    ) -> Result<ProviderResponse, AtendenteError> {
        let request = GenerateRequest {
            system_prompt: system_prompt.to_string(),
            turns: history.to_vec(),
            tools: tools.to_vec(),
        };

        let max_attempts = self.policy.max_attempts;
        let mut attempt = 1;
        loop {
            match self.provider.generate(request.clone()).await {
                Ok(response) => {
                    debug!(attempt, finish_reason = ?response.finish_reason, "generation succeeded");
                    return Ok(apply_safety_fallback(response));
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.backoff_delay(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient provider error, retrying"
                    );
                    metrics::counter!("atendente_llm_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(attempt, retryable = e.is_retryable(), error = %e, "generation failed");
                    return Err(e);
                }
            }
        }
    }

    /// Single user turn on top of `history`, without tools.
    pub async fn chat(
        &self,
        system_prompt: &str,
        user_text: &str,
        history: &[Turn],
    ) -> Result<String, AtendenteError> {
        let mut turns = history.to_vec();
        turns.push(Turn::user(user_text));
        let response = self.generate(system_prompt, &turns, &[]).await?;
        Ok(response.text)
    }
}

fn apply_safety_fallback(response: ProviderResponse) -> ProviderResponse {
    if response.finish_reason == FinishReason::Safety {
        warn!("provider safety filter triggered, using fallback text");
        return ProviderResponse {
            text: SAFETY_FALLBACK_TEXT.to_string(),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Safety,
        };
    }
    response
}
