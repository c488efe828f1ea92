//! LLM Client module for SessionPilot
//!
//! Provides the completion client, the connection factory and the
//! model-ladder resolver that picks which local model the stages talk to.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

mod chat;
pub mod client;
mod error;
mod resolver;
mod types;

pub use chat::{ChatClient, ConnectionConfig, PLACEHOLDER_API_KEY};
pub use client::LlmClient;
pub use error::LlmError;
pub use resolver::{Capability, HttpModelProbe, ModelProbe, ModelResolution, resolve_model};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};

use crate::config::LlmConfig;

/// Model used when the ladder is empty and nothing else is known
pub const DEFAULT_MODEL: &str = "llama3.2:1b";

/// Build a connection configuration for one model on the local service
///
/// Always carries the placeholder auth key and the configured keep-warm hint.
pub fn connect(
    config: &LlmConfig,
    model_name: &str,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
) -> ConnectionConfig {
    debug!(%model_name, %temperature, %max_tokens, ?timeout, "connect: called");
    ConnectionConfig {
        base_url: config.base_url.clone(),
        api_key: PLACEHOLDER_API_KEY.to_string(),
        model: model_name.to_string(),
        temperature,
        max_tokens,
        timeout,
        keep_alive: Some(config.keep_alive.clone()),
    }
}

/// Create a client for the resolved model using the configured defaults
pub fn create_client(config: &LlmConfig, model_name: &str) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(%model_name, "create_client: called");
    let conn = connect(
        config,
        model_name,
        config.temperature,
        config.max_tokens,
        Duration::from_millis(config.timeout_ms),
    );
    Ok(Arc::new(ChatClient::new(conn)?))
}
