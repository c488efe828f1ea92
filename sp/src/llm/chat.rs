//! Chat-completion API client implementation
//!
//! Implements the LlmClient trait for any OpenAI-compatible
//! `/v1/chat/completions` endpoint (local model servers included). One
//! attempt per call: no retry loop, the request timeout bounds the wait.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, TokenUsage};

/// Auth header value for local deployments, which do not check it
pub const PLACEHOLDER_API_KEY: &str = "local-no-auth";

/// Everything needed to talk to one model on one endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// API base URL, without the `/v1` suffix
    pub base_url: String,
    /// Bearer token (the placeholder for local services)
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Default sampling temperature
    pub temperature: f32,
    /// Response token cap
    pub max_tokens: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Keep-warm hint so the service does not unload the model between stages
    pub keep_alive: Option<String>,
}

/// OpenAI-compatible chat completion client
pub struct ChatClient {
    conn: ConnectionConfig,
    http: Client,
}

impl ChatClient {
    /// Create a new client from a connection configuration
    pub fn new(conn: ConnectionConfig) -> Result<Self, LlmError> {
        debug!(model = %conn.model, base_url = %conn.base_url, "ChatClient::new: called");
        let http = Client::builder().timeout(conn.timeout).build().map_err(LlmError::Network)?;
        Ok(Self { conn, http })
    }

    /// The connection this client was built from
    pub fn connection(&self) -> &ConnectionConfig {
        &self.conn
    }

    /// Build the request body for the chat completions API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(model = %self.conn.model, "build_request_body: called");

        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        messages.extend(request.messages.iter().map(|m| {
            serde_json::json!({
                "role": m.role,
                "content": m.content,
            })
        }));

        let max_tokens = request
            .max_tokens
            .map(|t| t.min(self.conn.max_tokens))
            .unwrap_or(self.conn.max_tokens);
        let temperature = request.temperature.unwrap_or(self.conn.temperature);

        let mut body = serde_json::json!({
            "model": self.conn.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "stream": false,
        });

        if let Some(keep_alive) = &self.conn.keep_alive {
            debug!(%keep_alive, "build_request_body: adding keep_alive");
            body["keep_alive"] = serde_json::json!(keep_alive);
        }

        body
    }

    /// Parse the chat completions API response
    fn parse_response(&self, api_response: ChatResponse) -> CompletionResponse {
        debug!(choices = api_response.choices.len(), "parse_response: called");
        let content = api_response.choices.into_iter().next().and_then(|c| c.message.content);
        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        CompletionResponse {
            content,
            model: api_response.model.unwrap_or_else(|| self.conn.model.clone()),
            usage,
        }
    }
}

#[async_trait]
impl LlmClient for ChatClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.conn.model, "complete: called");
        let url = format!("{}/v1/chat/completions", self.conn.base_url.trim_end_matches('/'));
        let body = self.build_request_body(&request);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.conn.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    debug!("complete: request timed out");
                    LlmError::Timeout(self.conn.timeout)
                } else {
                    debug!(error = %e, "complete: network error");
                    LlmError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "complete: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        debug!("complete: success");
        let api_response: ChatResponse = response.json().await?;
        Ok(self.parse_response(api_response))
    }

    fn model(&self) -> &str {
        &self.conn.model
    }
}

// Chat completions API response types

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
