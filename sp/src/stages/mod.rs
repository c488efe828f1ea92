//! Pipeline stages
//!
//! Analyst, Planner, DirectiveWriter and Journalist share one shape: build a
//! prompt, make at most one model call, check the output against its contract
//! and fall back to a deterministic artifact on any failure. Every stage
//! returns a `StageRun`, never an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corpus::CorpusBuilder;
use crate::extract::{Contract, ContractError, decode, excerpt};
use crate::llm::{
    Capability, CompletionRequest, DEFAULT_MODEL, HttpModelProbe, LlmClient, LlmError, ModelResolution,
    create_client, resolve_model,
};
use crate::prompts::{PromptContext, PromptLoader};
use crate::session_log::{ArtifactMeta, SessionLog};

mod analyst;
mod directive;
mod journalist;
mod planner;

pub use analyst::Analyst;
pub use directive::{DirectiveWriter, ungrounded_paths};
pub use journalist::Journalist;
pub use planner::Planner;

/// Outage marker carried by fallback artifacts
pub const FALLBACK_MARKER: &str = "[FALLBACK]";

/// How long the startup listing probe may take
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one stage run
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    /// The model produced a valid artifact
    Normal(T),
    /// The deterministic fallback produced the artifact
    Degraded { artifact: T, reason: String },
}

impl<T> StageOutcome<T> {
    pub fn artifact(&self) -> &T {
        match self {
            Self::Normal(artifact) => artifact,
            Self::Degraded { artifact, .. } => artifact,
        }
    }

    pub fn into_artifact(self) -> T {
        match self {
            Self::Normal(artifact) => artifact,
            Self::Degraded { artifact, .. } => artifact,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Normal(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }
}

/// A stage outcome and the session artifact it was saved to
#[derive(Debug, Clone, PartialEq)]
pub struct StageRun<T> {
    pub outcome: StageOutcome<T>,
    /// None when the artifact could not be written
    pub saved: Option<PathBuf>,
}

impl<T> StageRun<T> {
    pub fn artifact(&self) -> &T {
        self.outcome.artifact()
    }

    pub fn into_artifact(self) -> T {
        self.outcome.into_artifact()
    }

    pub fn is_degraded(&self) -> bool {
        self.outcome.is_degraded()
    }

    pub fn reason(&self) -> Option<&str> {
        self.outcome.reason()
    }

    pub fn saved(&self) -> Option<&Path> {
        self.saved.as_deref()
    }
}

/// Why a stage could not use the model's answer
#[derive(Debug, Error)]
pub enum StageError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("model returned no text")]
    EmptyResponse,

    #[error("model output rejected: {0}")]
    Contract(#[from] ContractError),

    #[error("prompt error: {0}")]
    Prompt(String),
}

/// Everything the stages share, built once per process
pub struct PipelineContext {
    /// Project root all configured paths are relative to
    pub root: PathBuf,
    pub config: Config,
    /// Ladder resolution from the startup probe
    pub resolution: ModelResolution,
    pub llm: Arc<dyn LlmClient>,
    pub prompts: PromptLoader,
    pub session_log: SessionLog,
}

impl PipelineContext {
    pub fn new(root: impl Into<PathBuf>, config: Config, resolution: ModelResolution, llm: Arc<dyn LlmClient>) -> Self {
        let root = root.into();
        debug!(?root, model = %resolution.model, "PipelineContext::new: called");
        let prompts = PromptLoader::new(&root);
        let session_log = SessionLog::new(root.join(&config.paths.session_logs_dir));
        Self {
            root,
            config,
            resolution,
            llm,
            prompts,
            session_log,
        }
    }

    /// Probe the model service, resolve the ladder and create the client
    pub async fn connect(root: impl Into<PathBuf>, config: Config) -> eyre::Result<Self> {
        let root = root.into();
        debug!(?root, base_url = %config.llm.base_url, "PipelineContext::connect: called");

        let resolution = match HttpModelProbe::new(&config.llm.base_url, PROBE_TIMEOUT) {
            Ok(probe) => resolve_model(&config.llm.ladder, DEFAULT_MODEL, &probe).await,
            Err(e) => ModelResolution::unavailable(config.llm.smallest_tier(), format!("probe setup failed: {}", e)),
        };

        let llm = create_client(&config.llm, &resolution.model)?;
        Ok(Self::new(root, config, resolution, llm))
    }

    /// Resolve a configured path against the project root
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn corpus_builder(&self) -> CorpusBuilder {
        CorpusBuilder::new(&self.root, &self.config.paths)
    }

    pub fn prompt_context(&self) -> PromptContext {
        PromptContext::from_rules(&self.config.rules)
    }

    /// Make the stage's single model call and decode the answer
    pub(crate) async fn consult<T>(
        &self,
        template: &str,
        prompt_ctx: &PromptContext,
        user: String,
        temperature: f32,
    ) -> Result<T, StageError>
    where
        T: DeserializeOwned + Contract,
    {
        debug!(%template, user_len = user.len(), "consult: called");
        if let Capability::Unavailable(reason) = &self.resolution.capability {
            debug!(%reason, "consult: skipping model call");
            return Err(StageError::Unavailable(reason.clone()));
        }

        let system = self
            .prompts
            .render(template, prompt_ctx)
            .map_err(|e| StageError::Prompt(e.to_string()))?;
        let request = CompletionRequest::single(system, user).with_temperature(temperature);

        info!(%template, model = %self.llm.model(), "Querying model");
        let response = self.llm.complete(request).await?;
        let text = response.content.ok_or(StageError::EmptyResponse)?;
        debug!(raw_len = text.len(), "consult: raw response");

        decode::<T>(&text).map_err(|e| {
            warn!(%template, error = %e, raw = %excerpt(&text), "Model output failed contract");
            StageError::Contract(e)
        })
    }

    /// Save a stage artifact; failures are logged, never raised
    pub(crate) fn persist(&self, stage: &str, title: &str, degraded: Option<&str>, body: &str) -> Option<PathBuf> {
        let meta = ArtifactMeta {
            stage,
            title,
            model: &self.resolution.model,
            degraded,
        };
        match self.session_log.persist(&meta, body) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(%stage, error = %e, "Failed to save session artifact");
                None
            }
        }
    }
}
