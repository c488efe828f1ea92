//! Escalation to a larger remote model
//!
//! Off unless the operator turns it on and provides a real key, and then only
//! after per-call approval. Every completed call is appended to the usage ledger.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::approval::Approver;
use crate::config::{ApprovalMode, EscalationConfig};
use crate::llm::{ChatClient, CompletionRequest, ConnectionConfig, LlmClient, LlmError, PLACEHOLDER_API_KEY, TokenUsage};

const TEMPERATURE: f32 = 0.3;
/// Rough characters per token, for estimates before the call
const CHARS_PER_TOKEN: u64 = 4;

/// One ledger line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    /// RFC 3339, UTC
    pub timestamp: String,
    pub model: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    /// Label of the work the call was made for
    pub task: String,
    pub estimated_cost_usd: f64,
}

#[derive(Debug, Error)]
pub enum EscalationError {
    #[error("remote model call failed: {0}")]
    Remote(#[from] LlmError),

    #[error("remote model returned no text")]
    EmptyResponse,
}

/// Result of asking to escalate
#[derive(Debug, Clone, PartialEq)]
pub enum EscalationOutcome {
    /// Mode is off or no real key is configured; nothing was asked or sent
    Disabled,
    /// The operator said no
    Denied,
    Completed { text: String, usage: UsageEntry },
}

pub struct EscalationGate {
    config: EscalationConfig,
    ledger_path: PathBuf,
    approver: Box<dyn Approver>,
}

impl EscalationGate {
    pub fn new(config: EscalationConfig, ledger_path: impl Into<PathBuf>, approver: Box<dyn Approver>) -> Self {
        let ledger_path = ledger_path.into();
        debug!(?ledger_path, mode = ?config.approval_mode, "EscalationGate::new: called");
        Self {
            config,
            ledger_path,
            approver,
        }
    }

    /// Key from the configured environment variable, if it is a real one
    fn api_key(&self) -> Option<String> {
        std::env::var(&self.config.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY)
    }

    pub fn enabled(&self) -> bool {
        debug!("EscalationGate::enabled: called");
        self.config.approval_mode == ApprovalMode::On && self.api_key().is_some()
    }

    /// Cost of sending `prompt` and receiving a full-length answer
    pub fn estimate_cost(&self, prompt: &str) -> f64 {
        let usage = TokenUsage {
            input_tokens: (prompt.chars().count() as u64).div_ceil(CHARS_PER_TOKEN),
            output_tokens: u64::from(self.config.max_tokens),
        };
        usage.cost_usd(self.config.input_price_per_mtok, self.config.output_price_per_mtok)
    }

    /// Ask the operator; anything but an explicit yes is a denial
    pub fn request_approval(&self, reason: &str, summary: &str, estimated_cost: f64) -> bool {
        debug!(%reason, %estimated_cost, "EscalationGate::request_approval: called");
        let prompt = format!(
            "Escalate to {}?\n  Reason: {}\n  Request: {}\n  Estimated cost: ${:.4}\nApprove",
            self.config.model, reason, summary, estimated_cost
        );
        self.approver.confirm(&prompt)
    }

    /// Append one ledger line; failures are logged and swallowed
    pub fn log_usage(&self, entry: &UsageEntry) {
        debug!(task = %entry.task, "EscalationGate::log_usage: called");
        if let Err(e) = self.append(entry) {
            warn!(path = %self.ledger_path.display(), error = %e, "Failed to write usage ledger");
        }
    }

    fn append(&self, entry: &UsageEntry) -> eyre::Result<()> {
        if let Some(parent) = self.ledger_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.ledger_path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Gate, approve, call the remote model once, then record usage
    pub async fn escalate(&self, task: &str, reason: &str, prompt: &str) -> Result<EscalationOutcome, EscalationError> {
        debug!(%task, "EscalationGate::escalate: called");
        let Some(api_key) = self.api_key().filter(|_| self.config.approval_mode == ApprovalMode::On) else {
            info!("Escalation disabled");
            return Ok(EscalationOutcome::Disabled);
        };
        let client = ChatClient::new(ConnectionConfig {
            base_url: self.config.base_url.clone(),
            api_key,
            model: self.config.model.clone(),
            temperature: TEMPERATURE,
            max_tokens: self.config.max_tokens,
            timeout: Duration::from_millis(self.config.timeout_ms),
            keep_alive: None,
        })?;
        self.escalate_with(&client, task, reason, prompt).await
    }

    /// `escalate` against a given client
    pub async fn escalate_with(
        &self,
        client: &dyn LlmClient,
        task: &str,
        reason: &str,
        prompt: &str,
    ) -> Result<EscalationOutcome, EscalationError> {
        debug!(%task, model = %client.model(), "EscalationGate::escalate_with: called");
        if !self.enabled() {
            info!("Escalation disabled");
            return Ok(EscalationOutcome::Disabled);
        }

        let estimate = self.estimate_cost(prompt);
        let summary: String = prompt.chars().take(120).collect();
        if !self.request_approval(reason, &summary, estimate) {
            info!(%task, "Escalation denied");
            return Ok(EscalationOutcome::Denied);
        }

        let request = CompletionRequest::single("You are a senior engineer. Answer precisely.", prompt)
            .with_temperature(TEMPERATURE);
        let response = client.complete(request).await?;
        let text = response.content.ok_or(EscalationError::EmptyResponse)?;

        let usage = UsageEntry {
            timestamp: Utc::now().to_rfc3339(),
            model: response.model,
            tokens_in: response.usage.input_tokens,
            tokens_out: response.usage.output_tokens,
            task: task.to_string(),
            estimated_cost_usd: response
                .usage
                .cost_usd(self.config.input_price_per_mtok, self.config.output_price_per_mtok),
        };
        self.log_usage(&usage);
        info!(%task, tokens_in = usage.tokens_in, tokens_out = usage.tokens_out, "Escalation complete");
        Ok(EscalationOutcome::Completed { text, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::DenyAll;
    use crate::llm::client::mock::MockLlmClient;
    use serial_test::serial;
    use tempfile::TempDir;

    struct Yes;

    impl Approver for Yes {
        fn confirm(&self, _prompt: &str) -> bool {
            true
        }
    }

    const KEY_ENV: &str = "SESSIONPILOT_TEST_ESCALATION_KEY";

    fn config(mode: ApprovalMode) -> EscalationConfig {
        EscalationConfig {
            approval_mode: mode,
            api_key_env: KEY_ENV.to_string(),
            input_price_per_mtok: 3.0,
            output_price_per_mtok: 15.0,
            max_tokens: 1000,
            ..EscalationConfig::default()
        }
    }

    fn set_key(value: Option<&str>) {
        // SAFETY: env-var tests run serially
        unsafe {
            match value {
                Some(v) => std::env::set_var(KEY_ENV, v),
                None => std::env::remove_var(KEY_ENV),
            }
        }
    }

    #[test]
    #[serial]
    fn test_disabled_when_mode_off_even_with_key() {
        set_key(Some("sk-real"));
        let gate = EscalationGate::new(config(ApprovalMode::Off), "ledger.jsonl", Box::new(Yes));
        let enabled = gate.enabled();
        set_key(None);
        assert!(!enabled);
    }

    #[test]
    #[serial]
    fn test_disabled_without_real_key() {
        let gate = EscalationGate::new(config(ApprovalMode::On), "ledger.jsonl", Box::new(Yes));

        set_key(None);
        assert!(!gate.enabled());
        set_key(Some("   "));
        assert!(!gate.enabled());
        set_key(Some(PLACEHOLDER_API_KEY));
        assert!(!gate.enabled());
        set_key(Some("sk-real"));
        assert!(gate.enabled());
        set_key(None);
    }

    #[test]
    fn test_estimate_cost() {
        let gate = EscalationGate::new(config(ApprovalMode::On), "ledger.jsonl", Box::new(Yes));
        // 8 chars -> 2 tokens in, 1000 tokens out
        let cost = gate.estimate_cost("12345678");
        assert!((cost - (2.0 * 3.0 + 1000.0 * 15.0) / 1_000_000.0).abs() < 1e-12);
    }

    #[tokio::test]
    #[serial]
    async fn test_disabled_makes_no_call() {
        set_key(None);
        let temp = TempDir::new().unwrap();
        let gate = EscalationGate::new(config(ApprovalMode::On), temp.path().join("l.jsonl"), Box::new(Yes));
        let client = MockLlmClient::with_texts(&["answer"]);

        let outcome = gate.escalate_with(&client, "T001", "stuck", "help").await.unwrap();
        assert_eq!(outcome, EscalationOutcome::Disabled);
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    #[serial]
    async fn test_denied_makes_no_call() {
        set_key(Some("sk-real"));
        let temp = TempDir::new().unwrap();
        let gate = EscalationGate::new(config(ApprovalMode::On), temp.path().join("l.jsonl"), Box::new(DenyAll));
        let client = MockLlmClient::with_texts(&["answer"]);

        let outcome = gate.escalate_with(&client, "T001", "stuck", "help").await;
        set_key(None);
        assert_eq!(outcome.unwrap(), EscalationOutcome::Denied);
        assert_eq!(client.call_count(), 0);
        assert!(!temp.path().join("l.jsonl").exists());
    }

    #[tokio::test]
    #[serial]
    async fn test_completed_call_is_logged() {
        set_key(Some("sk-real"));
        let temp = TempDir::new().unwrap();
        let ledger = temp.path().join("agents/usage.jsonl");
        let gate = EscalationGate::new(config(ApprovalMode::On), &ledger, Box::new(Yes));
        let client = MockLlmClient::with_texts(&["answer"]);

        let outcome = gate.escalate_with(&client, "T001", "stuck", "help").await;
        set_key(None);
        let EscalationOutcome::Completed { text, usage } = outcome.unwrap() else {
            panic!("expected a completed escalation");
        };
        assert_eq!(text, "answer");
        assert_eq!(usage.task, "T001");

        let lines: Vec<String> = fs::read_to_string(&ledger)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(lines.len(), 1);
        let entry: UsageEntry = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(entry, usage);
    }

    #[test]
    fn test_ledger_failure_is_swallowed() {
        let temp = TempDir::new().unwrap();
        // A directory where the ledger file should be
        let gate = EscalationGate::new(config(ApprovalMode::On), temp.path(), Box::new(Yes));
        gate.log_usage(&UsageEntry {
            timestamp: "t".to_string(),
            model: "m".to_string(),
            tokens_in: 1,
            tokens_out: 1,
            task: "x".to_string(),
            estimated_cost_usd: 0.0,
        });
    }
}
