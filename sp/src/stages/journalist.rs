//! Journalist: session evidence to JournalDraft, and approved drafts to the store

use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use super::{FALLBACK_MARKER, PipelineContext, StageOutcome, StageRun};
use crate::corpus::Corpus;
use crate::domain::{ApprovedDraft, Confidence, DraftProposal, JournalDraft};
use crate::probes::{CommandProbes, SessionProbes, clip, committed_from_diff};
use crate::store::{PlanningStore, WriteSummary};

const STAGE: &str = "journalist";
const TEMPERATURE: f32 = 0.2;
/// Active tasks listed in the prompt
const PROMPT_TASK_LIMIT: usize = 15;

pub struct Journalist {
    ctx: Arc<PipelineContext>,
    probes: Box<dyn SessionProbes>,
}

impl Journalist {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        debug!("Journalist::new: called");
        let probes = Box::new(CommandProbes::new(ctx.root.clone(), ctx.config.probes.clone()));
        Self { ctx, probes }
    }

    pub fn with_probes(mut self, probes: Box<dyn SessionProbes>) -> Self {
        self.probes = probes;
        self
    }

    /// Draft the journal entry for the session that just closed
    pub async fn draft(&self) -> StageRun<JournalDraft> {
        debug!("Journalist::draft: called");
        let diff = self.probes.git_summary().await;
        let corpus = self.ctx.corpus_builder().build();
        let test_floor = match self.probes.test_count().await {
            Some(count) => count,
            None => {
                let floor = corpus.latest_test_floor().unwrap_or(self.ctx.config.rules.test_floor);
                warn!(%floor, "Test count probe failed; carrying the last known floor");
                floor
            }
        };

        let session_id = corpus.next_session_id();
        let date = Local::now().date_naive().to_string();
        info!(%session_id, %test_floor, "Drafting journal entry");

        let user = build_prompt(
            &corpus,
            &session_id,
            &date,
            test_floor,
            clip(&diff, self.ctx.config.probes.diff_chars),
        );

        let outcome = match self
            .ctx
            .consult::<DraftProposal>(STAGE, &self.ctx.prompt_context(), user, TEMPERATURE)
            .await
        {
            Ok(proposal) => StageOutcome::Normal(JournalDraft {
                session_id,
                date,
                test_floor,
                summary: proposal.summary,
                committed: proposal.committed,
                tasks_completed: known_tasks(&corpus, proposal.tasks_completed),
                tasks_added: proposal.tasks_added,
                confidence: proposal.confidence,
            }),
            Err(e) => {
                let reason = e.to_string();
                warn!(%reason, "Journalist degraded to fallback draft");
                StageOutcome::Degraded {
                    artifact: JournalDraft {
                        summary: format!(
                            "{} Session {} closed. Model service unavailable; manual review required. {} tests listed.",
                            FALLBACK_MARKER, session_id, test_floor
                        ),
                        session_id,
                        date,
                        test_floor,
                        committed: committed_from_diff(&diff),
                        tasks_completed: Vec::new(),
                        tasks_added: Vec::new(),
                        confidence: Confidence::Low,
                    },
                    reason,
                }
            }
        };

        let draft = outcome.artifact();
        let saved = self.ctx.persist(
            STAGE,
            &format!("Journal Draft {}", draft.session_id),
            outcome.reason(),
            &draft.to_markdown(),
        );
        StageRun { outcome, saved }
    }

    /// Write an approved draft into the journal and task documents
    pub fn write(&self, approved: &ApprovedDraft) -> eyre::Result<WriteSummary> {
        debug!(session_id = %approved.draft().session_id, "Journalist::write: called");
        let builder = self.ctx.corpus_builder();
        PlanningStore::new(builder.tasks_path(), builder.journal_path()).approve_and_write(approved)
    }
}

/// Keep only ids of tasks that exist in the corpus
fn known_tasks(corpus: &Corpus, ids: Vec<String>) -> Vec<String> {
    let (known, unknown): (Vec<String>, Vec<String>) = ids.into_iter().partition(|id| corpus.task(id).is_some());
    if !unknown.is_empty() {
        warn!(?unknown, "Dropping completed task ids not found in the corpus");
    }
    known
}

fn build_prompt(corpus: &Corpus, session_id: &str, date: &str, test_floor: u32, diff: &str) -> String {
    let mut out = String::from("Draft the journal entry for the session that just closed.\n\n");
    out.push_str(&format!("SESSION ID: {}\nDATE: {}\nTEST COUNT: {}\n\n", session_id, date, test_floor));
    out.push_str(&format!("GIT DIFF:\n{}\n\n", diff));

    out.push_str("ACTIVE TASKS:\n");
    let mut any = false;
    for task in corpus.active_tasks().take(PROMPT_TASK_LIMIT) {
        out.push_str(&format!("  {}: {}\n", task.id, task.title));
        any = true;
    }
    if !any {
        out.push_str("  none\n");
    }
    out
}
