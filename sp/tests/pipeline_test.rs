//! Integration tests for SessionPilot
//!
//! These tests drive the stages through the public API with the model forced
//! down or misbehaving, and check the write path against real files.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sessionpilot::approval::Approver;
use sessionpilot::config::Config;
use sessionpilot::corpus::{CorpusBuilder, validate};
use sessionpilot::domain::{
    CoherenceReport, Confidence, DIRECTIVE_PREAMBLE, JournalDraft, OptionLabel, Risk, SessionOption, SessionPlan,
};
use sessionpilot::llm::{
    Capability, CompletionRequest, CompletionResponse, LlmClient, LlmError, ModelResolution, Role,
};
use sessionpilot::stages::{Analyst, DirectiveWriter, FALLBACK_MARKER, PipelineContext, Planner};
use sessionpilot::store::PlanningStore;
use tempfile::TempDir;

// =============================================================================
// Fixtures
// =============================================================================

/// Model that always times out
struct DownClient;

#[async_trait]
impl LlmClient for DownClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::Timeout(Duration::from_secs(1)))
    }

    fn model(&self) -> &str {
        "down-model"
    }
}

/// Model that always answers with the same text
struct FixedClient(&'static str);

#[async_trait]
impl LlmClient for FixedClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        Ok(CompletionResponse::text("fixed-model", self.0))
    }

    fn model(&self) -> &str {
        "fixed-model"
    }
}

/// Model that remembers the last request and then times out
#[derive(Default)]
struct RecordingClient {
    last: Mutex<Option<CompletionRequest>>,
}

#[async_trait]
impl LlmClient for RecordingClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        *self.last.lock().unwrap() = Some(request);
        Err(LlmError::Timeout(Duration::from_secs(1)))
    }

    fn model(&self) -> &str {
        "recording-model"
    }
}

struct Yes;

impl Approver for Yes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn project() -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    write(
        temp.path(),
        "docs/planning/tasks.yaml",
        "- id: T001\n  title: Build loot tables\n  status: ACTIVE\n  scope: dungeon\n\
         - id: T002\n  title: Polish combat\n  status: QUEUED\n  scope: dungeon\n\
         - id: T003\n  title: Dungeon hooks in the shared inventory\n  status: ACTIVE\n  scope: shared\n",
    );
    write(
        temp.path(),
        "docs/journal/journal.yaml",
        "- id: S001\n  test_floor: 40\n  summary: Loot scaffolding landed.\n",
    );
    temp
}

fn config() -> Config {
    let mut config = Config::default();
    config.rules.apps = vec!["dungeon".to_string(), "racing".to_string()];
    config.rules.test_floor = 100;
    config
}

fn context(root: &Path, llm: Arc<dyn LlmClient>) -> Arc<PipelineContext> {
    let resolution = ModelResolution {
        model: llm.model().to_string(),
        capability: Capability::Available,
    };
    Arc::new(PipelineContext::new(root, config(), resolution, llm))
}

fn option(label: OptionLabel, title: &str, tasks: &[&str]) -> SessionOption {
    SessionOption {
        label,
        title: title.to_string(),
        rationale: String::new(),
        tasks: tasks.iter().map(|t| t.to_string()).collect(),
        risk: Risk::Medium,
        milestone_impact: String::new(),
    }
}

// =============================================================================
// Analyst
// =============================================================================

#[tokio::test]
async fn test_analyst_fallback_carries_validator_flags() {
    let temp = project();
    let ctx = context(temp.path(), Arc::new(DownClient));
    let corpus = ctx.corpus_builder().build();
    let expected = validate(&corpus, &ctx.config.rules).flags();
    assert_eq!(expected.len(), 2, "fixture should break rules 1 and 4");

    let outcome = Analyst::new(ctx).run().await;
    assert!(outcome.is_degraded());
    let report = outcome.artifact();
    assert!(report.session_primer.contains(FALLBACK_MARKER));
    assert!(!report.open_risks.is_empty());
    assert_eq!(report.constitutional_flags, expected);
    assert_eq!(report.corpus_hash, corpus.corpus_hash);
}

#[tokio::test]
async fn test_analyst_sends_one_user_turn() {
    let temp = project();
    let client = Arc::new(RecordingClient::default());
    let ctx = context(temp.path(), client.clone());

    let outcome = Analyst::new(ctx).run().await;
    assert!(outcome.is_degraded());

    let request = client.last.lock().unwrap().take().expect("analyst called the model");
    assert!(!request.system_prompt.is_empty());
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].role, Role::User);
    assert!(request.messages[0].content.contains("T001"));
}

#[tokio::test]
async fn test_analyst_unclosed_brace_falls_back() {
    let temp = project();
    let ctx = context(
        temp.path(),
        Arc::new(FixedClient(r#"Sure! {"session_primer": "All good", "open_risks": ["#)),
    );

    let outcome = Analyst::new(ctx).run().await;
    assert!(outcome.is_degraded());
    assert!(outcome.artifact().session_primer.contains(FALLBACK_MARKER));
}

#[tokio::test]
async fn test_each_run_reports_its_own_artifact() {
    let temp = project();
    let ctx = context(temp.path(), Arc::new(DownClient));
    let analyst = Analyst::new(ctx);

    let first = analyst.run().await;
    let second = analyst.run().await;
    let (first, second) = (first.saved().unwrap(), second.saved().unwrap());
    assert_ne!(first, second);
    assert!(first.exists());
    assert!(second.exists());
}

#[tokio::test]
async fn test_analyst_on_empty_corpus() {
    let temp = TempDir::new().unwrap();
    let ctx = context(temp.path(), Arc::new(DownClient));
    let corpus = ctx.corpus_builder().build();
    assert!(corpus.is_empty());

    let outcome = Analyst::new(ctx).run().await;
    assert_eq!(outcome.artifact().corpus_hash, corpus.corpus_hash);
    assert!(outcome.artifact().constitutional_flags.is_empty());
}

#[test]
fn test_corpus_hash_is_stable() {
    let temp = project();
    let config = config();
    let first = CorpusBuilder::new(temp.path(), &config.paths).build();
    let second = CorpusBuilder::new(temp.path(), &config.paths).build();
    assert_eq!(first.corpus_hash, second.corpus_hash);
    assert_eq!(first.corpus_hash.len(), 64);
}

#[test]
fn test_next_session_id_from_journal() {
    let temp = TempDir::new().unwrap();
    let journal: String = (1..=5).map(|n| format!("- id: S{:03}\n  summary: s\n", n)).collect();
    write(temp.path(), "docs/journal/journal.yaml", &journal);

    let corpus = CorpusBuilder::new(temp.path(), &config().paths).build();
    assert_eq!(corpus.next_session_id(), "S006");

    let empty = CorpusBuilder::new(TempDir::new().unwrap().path(), &config().paths).build();
    assert_eq!(empty.next_session_id(), "S001");
}

// =============================================================================
// Planner
// =============================================================================

#[tokio::test]
async fn test_planner_down_with_one_risk() {
    let temp = project();
    let ctx = context(temp.path(), Arc::new(DownClient));
    let report = CoherenceReport {
        session_primer: "Loot landed.".to_string(),
        open_risks: vec!["G3 has no milestone".to_string()],
        queued_focus: "Finish loot".to_string(),
        constitutional_flags: vec![],
        corpus_hash: "ab".repeat(32),
    };

    let outcome = Planner::new(ctx).run(&report).await;
    assert!(outcome.is_degraded());
    let plan = outcome.artifact();
    assert_eq!(plan.corpus_hash, report.corpus_hash);
    assert_eq!(plan.alternatives.len(), 2);
    let divert = plan.divert().expect("fallback plan has a Divert option");
    assert!(divert.title.to_lowercase().contains("restore"));
    assert!(divert.title.to_lowercase().contains("connection"));
}

#[tokio::test]
async fn test_planner_rejects_three_alternatives() {
    let temp = project();
    let raw = r#"{
      "recommended": {"label": "Headlong", "title": "Loot", "tasks": ["a"], "risk": "Low"},
      "alternatives": [
        {"label": "Divert", "title": "Fix", "tasks": ["b"], "risk": "Low"},
        {"label": "Alt", "title": "Docs", "tasks": ["c"], "risk": "Low"},
        {"label": "Alt", "title": "More docs", "tasks": ["d"], "risk": "Low"}
      ]
    }"#;
    let ctx = context(temp.path(), Arc::new(FixedClient(raw)));
    let report = CoherenceReport {
        session_primer: "p".to_string(),
        open_risks: vec![],
        queued_focus: "q".to_string(),
        constitutional_flags: vec![],
        corpus_hash: String::new(),
    };

    let outcome = Planner::new(ctx).run(&report).await;
    assert!(outcome.is_degraded());
    assert_eq!(outcome.artifact().alternatives.len(), 2);
}

// =============================================================================
// Directive writer
// =============================================================================

#[tokio::test]
async fn test_directive_fallback_keeps_task_text() {
    let temp = project();
    let ctx = context(temp.path(), Arc::new(DownClient));
    let plan = SessionPlan {
        recommended: option(
            OptionLabel::Headlong,
            "Loot drops",
            &["Create path/item with ItemDrop record"],
        ),
        alternatives: vec![
            option(OptionLabel::Divert, "Fix", &["b"]),
            option(OptionLabel::Alt, "Docs", &["c"]),
        ],
        open_questions: vec![],
        risks_addressed: vec![],
        corpus_hash: "cd".repeat(32),
    };

    let outcome = DirectiveWriter::new(ctx).run(&plan).await;
    assert!(outcome.is_degraded());
    let directive = outcome.artifact();
    assert!(
        directive
            .tasks
            .iter()
            .any(|t| t == "Create path/item with ItemDrop record")
    );
    assert_eq!(directive.confidence, Confidence::Low);
    assert_eq!(directive.preamble, DIRECTIVE_PREAMBLE);
}

// =============================================================================
// Journal write
// =============================================================================

#[test]
fn test_approve_and_write_marks_only_completed() {
    let temp = project();
    let builder = CorpusBuilder::new(temp.path(), &config().paths);
    let draft = JournalDraft {
        session_id: "S002".to_string(),
        date: "2026-10-17".to_string(),
        test_floor: 120,
        summary: "Loot tables finished.".to_string(),
        committed: vec!["abc1234".to_string()],
        tasks_completed: vec!["T001".to_string()],
        tasks_added: vec![],
        confidence: Confidence::High,
    };
    let approved = draft.approve(&Yes).expect("approved");

    PlanningStore::new(builder.tasks_path(), builder.journal_path())
        .approve_and_write(&approved)
        .expect("write succeeds");

    let corpus = builder.build();
    let t1 = corpus.task("T001").unwrap();
    assert_eq!(t1.status.as_str(), "DONE");
    assert_eq!(t1.extra.get("modified_by").and_then(|v| v.as_str()), Some("journalist"));
    assert_eq!(t1.extra.get("modified_session").and_then(|v| v.as_str()), Some("S002"));
    assert!(t1.extra.contains_key("modified"));

    let t2 = corpus.task("T002").unwrap();
    assert_eq!(t2.status.as_str(), "QUEUED");
    assert!(!t2.extra.contains_key("modified_by"));

    assert_eq!(corpus.latest_journal().unwrap().id, "S002");
    assert_eq!(corpus.latest_test_floor(), Some(120));
    assert_eq!(corpus.next_session_id(), "S003");
}
