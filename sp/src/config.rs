//! SessionPilot configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main SessionPilot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local model service configuration
    pub llm: LlmConfig,

    /// Planning document and artifact locations
    pub paths: PathsConfig,

    /// Deterministic rule parameters
    pub rules: RulesConfig,

    /// Git and test-count probes used by the journalist
    pub probes: ProbesConfig,

    /// Remote escalation model configuration
    pub escalation: EscalationConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.llm.ladder.is_empty() {
            return Err(eyre::eyre!("llm.ladder must name at least one model"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(eyre::eyre!(
                "llm.temperature must be between 0.0 and 2.0 (got {})",
                self.llm.temperature
            ));
        }
        if self.probes.test_list_command.is_empty() {
            return Err(eyre::eyre!("probes.test-list-command must not be empty"));
        }
        regex::Regex::new(&self.probes.test_line_pattern).context("probes.test-line-pattern is not a valid regex")?;
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// The project-local file is looked up under `root`, not the working directory.
    pub fn load(config_path: Option<&PathBuf>, root: &Path) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .sessionpilot.yml
        let local_config = Self::local_path(root);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/sessionpilot/sessionpilot.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("sessionpilot").join("sessionpilot.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Errors are swallowed: a broken config file is reported later by `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>, root: &Path) -> Option<String> {
        let candidates = [
            config_path.cloned(),
            Some(Self::local_path(root)),
            dirs::config_dir().map(|d| d.join("sessionpilot").join("sessionpilot.yml")),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    fn local_path(root: &Path) -> PathBuf {
        root.join(".sessionpilot.yml")
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Local model service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL of the chat-completion compatible service
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Capability ladder, most capable first
    pub ladder: Vec<String>,

    /// Default sampling temperature
    pub temperature: f32,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// How long the service should keep the model loaded between calls
    #[serde(rename = "keep-alive")]
    pub keep_alive: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            ladder: vec![
                "llama3.2:3b".to_string(),
                "llama3.2:1b".to_string(),
                "qwen2.5:0.5b".to_string(),
            ],
            temperature: 0.3,
            max_tokens: 2048,
            timeout_ms: 120_000,
            keep_alive: "30m".to_string(),
        }
    }
}

impl LlmConfig {
    /// Smallest (last) tier of the ladder, the safe default when probing fails
    pub fn smallest_tier(&self) -> &str {
        self.ladder
            .last()
            .map(String::as_str)
            .unwrap_or(crate::llm::DEFAULT_MODEL)
    }
}

/// Planning document and artifact locations, relative to the project root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding goals/milestones/tasks/sessions documents
    #[serde(rename = "planning-dir")]
    pub planning_dir: PathBuf,

    /// Directory holding the journal document
    #[serde(rename = "journal-dir")]
    pub journal_dir: PathBuf,

    /// Directory session artifacts are written to
    #[serde(rename = "session-logs-dir")]
    pub session_logs_dir: PathBuf,

    /// Append-only escalation usage ledger
    #[serde(rename = "ledger-path")]
    pub ledger_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            planning_dir: PathBuf::from("docs/planning"),
            journal_dir: PathBuf::from("docs/journal"),
            session_logs_dir: PathBuf::from("docs/agents/session_logs"),
            ledger_path: PathBuf::from("docs/agents/usage_ledger.jsonl"),
        }
    }
}

/// Parameters of the four deterministic rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Minimum acceptable test count
    #[serde(rename = "test-floor")]
    pub test_floor: u32,

    /// Names of the independent applications in the project
    pub apps: Vec<String>,

    /// Scope value marking shared, app-agnostic work
    #[serde(rename = "shared-scope")]
    pub shared_scope: String,

    /// Task kind marking an interactive-scene unit
    #[serde(rename = "scene-kind")]
    pub scene_kind: String,

    /// Declared scene templates new scenes must trace to
    #[serde(rename = "scene-templates")]
    pub scene_templates: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            test_floor: 0,
            apps: Vec::new(),
            shared_scope: "shared".to_string(),
            scene_kind: "scene".to_string(),
            scene_templates: Vec::new(),
        }
    }
}

/// Probes the journalist runs at session end
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbesConfig {
    /// Command that lists tests without running them
    #[serde(rename = "test-list-command")]
    pub test_list_command: Vec<String>,

    /// Regex matching one listed test per line
    #[serde(rename = "test-line-pattern")]
    pub test_line_pattern: String,

    /// Characters of diff summary passed to the model
    #[serde(rename = "diff-chars")]
    pub diff_chars: usize,

    /// Probe timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            test_list_command: vec![
                "cargo".to_string(),
                "test".to_string(),
                "--".to_string(),
                "--list".to_string(),
            ],
            test_line_pattern: r": test$".to_string(),
            diff_chars: 2000,
            timeout_ms: 120_000,
        }
    }
}

/// Whether escalation to the remote model is allowed at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Escalation disabled
    #[default]
    Off,
    /// Escalation allowed after per-call human approval
    On,
}

/// Remote escalation model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Approval mode
    #[serde(rename = "approval-mode")]
    pub approval_mode: ApprovalMode,

    /// Environment variable containing the access key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Remote model identifier
    pub model: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// USD per million input tokens
    #[serde(rename = "input-price-per-mtok")]
    pub input_price_per_mtok: f64,

    /// USD per million output tokens
    #[serde(rename = "output-price-per-mtok")]
    pub output_price_per_mtok: f64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            approval_mode: ApprovalMode::Off,
            api_key_env: "SESSIONPILOT_ESCALATION_KEY".to_string(),
            base_url: "https://openrouter.ai/api".to_string(),
            model: "openai/gpt-4o".to_string(),
            max_tokens: 4096,
            timeout_ms: 300_000,
            input_price_per_mtok: 2.5,
            output_price_per_mtok: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.llm.ladder.len(), 3);
        assert_eq!(config.escalation.approval_mode, ApprovalMode::Off);
        assert_eq!(config.rules.shared_scope, "shared");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_smallest_tier_is_last() {
        let config = LlmConfig::default();
        assert_eq!(config.smallest_tier(), "qwen2.5:0.5b");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  base-url: http://gpu-box:11434
  ladder: [big, small]
  temperature: 0.1
  max-tokens: 512
  timeout-ms: 5000
  keep-alive: 1h

paths:
  planning-dir: planning

rules:
  test-floor: 402
  apps: [slime_breeder, dungeon]
  scene-templates: [BaseScene]

escalation:
  approval-mode: on
  api-key-env: MY_KEY

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.base_url, "http://gpu-box:11434");
        assert_eq!(config.llm.ladder, vec!["big", "small"]);
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.llm.keep_alive, "1h");
        assert_eq!(config.paths.planning_dir, PathBuf::from("planning"));
        assert_eq!(config.paths.journal_dir, PathBuf::from("docs/journal"));
        assert_eq!(config.rules.test_floor, 402);
        assert_eq!(config.rules.apps.len(), 2);
        assert_eq!(config.escalation.approval_mode, ApprovalMode::On);
        assert_eq!(config.escalation.api_key_env, "MY_KEY");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  ladder: [only-model]
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.llm.ladder, vec!["only-model"]);

        // Defaults for unspecified
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.probes.diff_chars, 2000);
        assert_eq!(config.escalation.approval_mode, ApprovalMode::Off);
    }

    #[test]
    fn test_load_reads_project_file_under_root() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::write(
            temp.path().join(".sessionpilot.yml"),
            "log-level: debug\nrules:\n  test-floor: 250\n  apps: [racing]\n",
        )
        .unwrap();

        let config = Config::load(None, temp.path()).unwrap();
        assert_eq!(config.rules.test_floor, 250);
        assert_eq!(config.rules.apps, vec!["racing"]);
        assert_eq!(Config::load_log_level(None, temp.path()).as_deref(), Some("debug"));
    }

    #[test]
    fn test_explicit_path_wins_over_root_file() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::write(temp.path().join(".sessionpilot.yml"), "rules:\n  test-floor: 250\n").unwrap();
        let explicit = temp.path().join("other.yml");
        fs::write(&explicit, "rules:\n  test-floor: 7\n").unwrap();

        let config = Config::load(Some(&explicit), temp.path()).unwrap();
        assert_eq!(config.rules.test_floor, 7);
    }

    #[test]
    fn test_validate_rejects_empty_ladder() {
        let mut config = Config::default();
        config.llm.ladder.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_test_pattern() {
        let mut config = Config::default();
        config.probes.test_line_pattern = "(unclosed".to_string();
        assert!(config.validate().is_err());
    }
}
