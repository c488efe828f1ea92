//! LLM request/response types for SessionPilot
//!
//! These types model an OpenAI-style chat completion but carry only what the
//! pipeline needs: one system prompt, a short message list, sampling knobs.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (rendered from a Handlebars template)
    pub system_prompt: String,

    /// User messages (typically just one per stage)
    pub messages: Vec<Message>,

    /// Max tokens for response; capped by the connection's limit
    pub max_tokens: Option<u32>,

    /// Sampling temperature; defaults to the connection's temperature
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Single-turn request with connection defaults
    pub fn single(system_prompt: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages: vec![Message::user(user)],
            max_tokens: None,
            temperature: None,
        }
    }

    /// Override the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Total characters of prompt text, used for rough cost estimates
    pub fn prompt_chars(&self) -> usize {
        self.system_prompt.len() + self.messages.iter().map(|m| m.content.len()).sum::<usize>()
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(text: impl Into<String>) -> Self {
        debug!("Message::user: called");
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(text: impl Into<String>) -> Self {
        debug!("Message::assistant: called");
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Text content (if any)
    pub content: Option<String>,

    /// Model that actually answered
    pub model: String,

    /// Token usage for cost tracking
    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Text-only response, used by mocks and tests
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            model: model.into(),
            usage: TokenUsage::default(),
        }
    }
}

/// Token usage for cost tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Cost in USD given per-million-token prices
    pub fn cost_usd(&self, input_price_per_mtok: f64, output_price_per_mtok: f64) -> f64 {
        debug!(%self.input_tokens, %self.output_tokens, "TokenUsage::cost_usd: called");
        let input_cost = (self.input_tokens as f64 / 1_000_000.0) * input_price_per_mtok;
        let output_cost = (self.output_tokens as f64 / 1_000_000.0) * output_price_per_mtok;
        input_cost + output_cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
    }

    #[test]
    fn test_message_assistant() {
        let msg = Message::assistant("Hi there");
        assert_eq!(msg.role, Role::Assistant);
    }

    #[test]
    fn test_single_request_defaults() {
        let req = CompletionRequest::single("sys", "user").with_temperature(0.2);
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.max_tokens, None);
        assert_eq!(req.prompt_chars(), 7);
    }

    #[test]
    fn test_token_usage_cost() {
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 100_000,
        };

        // $2.50/M input, $10/M output
        let cost = usage.cost_usd(2.5, 10.0);
        assert!((cost - 3.5).abs() < 0.01);
    }
}
