//! Model-ladder resolution
//!
//! Walks the configured capability ladder (most capable first) and picks the
//! first model the local service reports as installed. Never fails: when the
//! service cannot be listed the smallest tier is returned together with an
//! `Unavailable` capability so stages can skip straight to their fallback.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::LlmError;

/// Whether the model service can be used for this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// A ladder model was confirmed by the listing probe
    Available,
    /// The service is unreachable or has no ladder model installed
    Unavailable(String),
}

impl Capability {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available)
    }
}

/// Outcome of resolving the ladder, computed once per process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResolution {
    /// Model the stages should use
    pub model: String,
    /// Whether calls to `model` are expected to work
    pub capability: Capability,
}

impl ModelResolution {
    /// Resolution used when the service is known to be down
    pub fn unavailable(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            capability: Capability::Unavailable(reason.into()),
        }
    }
}

/// Lists the models installed on the service
#[async_trait]
pub trait ModelProbe: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>, LlmError>;
}

/// Listing probe against an OpenAI-compatible `/v1/models` endpoint
pub struct HttpModelProbe {
    base_url: String,
    http: Client,
}

impl HttpModelProbe {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let base_url = base_url.into();
        debug!(%base_url, ?timeout, "HttpModelProbe::new: called");
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[async_trait]
impl ModelProbe for HttpModelProbe {
    async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/v1/models", self.base_url.trim_end_matches('/'));
        debug!(%url, "HttpModelProbe::list_models: called");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let list: ModelList = response.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

/// True when `installed` names the ladder entry, allowing an implicit `:latest` tag
fn matches_installed(entry: &str, installed: &str) -> bool {
    installed == entry || installed.strip_suffix(":latest") == Some(entry)
}

/// Resolve the ladder against the probe
///
/// Returns the first ladder entry the probe confirms. Any probe failure yields
/// the smallest tier marked `Unavailable`; this function never errors.
pub async fn resolve_model(ladder: &[String], fallback: &str, probe: &dyn ModelProbe) -> ModelResolution {
    debug!(?ladder, %fallback, "resolve_model: called");
    let smallest = ladder.last().map(String::as_str).unwrap_or(fallback);

    let installed = match probe.list_models().await {
        Ok(installed) => installed,
        Err(e) => {
            warn!(error = %e, model = %smallest, "Model service unreachable, using smallest tier");
            return ModelResolution::unavailable(smallest, format!("model service unreachable: {}", e));
        }
    };
    debug!(installed_count = installed.len(), "resolve_model: probe succeeded");

    for entry in ladder {
        if installed.iter().any(|i| matches_installed(entry, i)) {
            info!(model = %entry, "Resolved model from ladder");
            return ModelResolution {
                model: entry.clone(),
                capability: Capability::Available,
            };
        }
        debug!(%entry, "resolve_model: not installed");
    }

    warn!(model = %smallest, "No ladder model installed, using smallest tier");
    ModelResolution::unavailable(smallest, "no ladder model is installed on the model service")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProbe(Result<Vec<&'static str>, ()>);

    #[async_trait]
    impl ModelProbe for StaticProbe {
        async fn list_models(&self) -> Result<Vec<String>, LlmError> {
            match &self.0 {
                Ok(models) => Ok(models.iter().map(|m| m.to_string()).collect()),
                Err(()) => Err(LlmError::Timeout(Duration::from_secs(1))),
            }
        }
    }

    fn ladder() -> Vec<String> {
        vec!["large".to_string(), "medium".to_string(), "small".to_string()]
    }

    #[tokio::test]
    async fn test_first_installed_entry_wins() {
        let probe = StaticProbe(Ok(vec!["small", "medium", "other"]));
        let resolution = resolve_model(&ladder(), "x", &probe).await;

        assert_eq!(resolution.model, "medium");
        assert_eq!(resolution.capability, Capability::Available);
    }

    #[tokio::test]
    async fn test_latest_tag_matches() {
        let probe = StaticProbe(Ok(vec!["large:latest"]));
        let resolution = resolve_model(&ladder(), "x", &probe).await;
        assert_eq!(resolution.model, "large");
        assert!(resolution.capability.is_available());
    }

    #[tokio::test]
    async fn test_probe_failure_returns_smallest_tier() {
        let probe = StaticProbe(Err(()));
        let resolution = resolve_model(&ladder(), "x", &probe).await;

        assert_eq!(resolution.model, "small");
        assert!(matches!(resolution.capability, Capability::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_nothing_installed_is_unavailable() {
        let probe = StaticProbe(Ok(vec!["unrelated"]));
        let resolution = resolve_model(&ladder(), "x", &probe).await;

        assert_eq!(resolution.model, "small");
        assert!(!resolution.capability.is_available());
    }

    #[tokio::test]
    async fn test_empty_ladder_uses_fallback_name() {
        let probe = StaticProbe(Err(()));
        let resolution = resolve_model(&[], "fallback-model", &probe).await;
        assert_eq!(resolution.model, "fallback-model");
    }

    #[tokio::test]
    async fn test_http_probe_unreachable_errors() {
        let probe = HttpModelProbe::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(probe.list_models().await.is_err());
    }

    #[test]
    fn test_model_list_deserialize() {
        let list: ModelList = serde_json::from_str(r#"{"object":"list","data":[{"id":"llama3.2:3b","object":"model"}]}"#).unwrap();
        assert_eq!(list.data[0].id, "llama3.2:3b");
    }
}
