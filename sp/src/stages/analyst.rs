//! Analyst: corpus to CoherenceReport

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{FALLBACK_MARKER, PipelineContext, StageOutcome, StageRun};
use crate::corpus::{Corpus, validate};
use crate::domain::CoherenceReport;

const STAGE: &str = "analyst";
const TEMPERATURE: f32 = 0.3;
/// Journal excerpt carried into a fallback primer
const PRIMER_EXCERPT_CHARS: usize = 120;

pub struct Analyst {
    ctx: Arc<PipelineContext>,
}

impl Analyst {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        debug!("Analyst::new: called");
        Self { ctx }
    }

    /// Load the corpus from disk and analyse it
    pub async fn run(&self) -> StageRun<CoherenceReport> {
        debug!("Analyst::run: called");
        let corpus = self.ctx.corpus_builder().build();
        self.analyse(&corpus).await
    }

    /// Produce a report for an already loaded corpus
    pub async fn analyse(&self, corpus: &Corpus) -> StageRun<CoherenceReport> {
        debug!(corpus_hash = %corpus.corpus_hash, "Analyst::analyse: called");
        let validation = validate(corpus, &self.ctx.config.rules);
        let flags = validation.flags();
        info!(violations = validation.count, "Deterministic rule check complete");

        let user = build_prompt(corpus, &flags);
        let outcome = match self
            .ctx
            .consult::<CoherenceReport>(STAGE, &self.ctx.prompt_context(), user, TEMPERATURE)
            .await
        {
            Ok(mut report) => {
                report.merge_flags(&flags);
                report.open_risks.extend(corpus.load_issues.iter().cloned());
                report.corpus_hash = corpus.corpus_hash.clone();
                StageOutcome::Normal(report)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(%reason, "Analyst degraded to fallback report");
                StageOutcome::Degraded {
                    artifact: fallback_report(corpus, flags, &reason),
                    reason,
                }
            }
        };

        let report = outcome.artifact();
        let saved = self
            .ctx
            .persist(STAGE, "Coherence Report", outcome.reason(), &report.to_markdown());
        StageRun { outcome, saved }
    }
}

fn build_prompt(corpus: &Corpus, flags: &[String]) -> String {
    let mut out = String::from("Analyse this project corpus.\n\n");
    out.push_str(&corpus.summary());

    out.push_str("\nDETERMINISTIC RULE CHECK:\n");
    if flags.is_empty() {
        out.push_str("  no violations\n");
    }
    for flag in flags {
        out.push_str(&format!("  {}\n", flag));
    }

    if !corpus.load_issues.is_empty() {
        out.push_str("\nLOAD ISSUES:\n");
        for issue in &corpus.load_issues {
            out.push_str(&format!("  {}\n", issue));
        }
    }
    out
}

/// Report built without the model from the corpus and the rule check alone
pub(crate) fn fallback_report(corpus: &Corpus, flags: Vec<String>, reason: &str) -> CoherenceReport {
    debug!(%reason, "fallback_report: called");
    let excerpt = corpus
        .latest_journal()
        .map(|entry| {
            let summary = entry.summary.trim();
            if summary.chars().count() > PRIMER_EXCERPT_CHARS {
                let cut: String = summary.chars().take(PRIMER_EXCERPT_CHARS).collect();
                format!("{}...", cut)
            } else {
                summary.to_string()
            }
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "No journal entries yet.".to_string());

    let mut open_risks = vec![format!(
        "Model service was unavailable ({}); this report holds only the deterministic rule check.",
        reason
    )];
    open_risks.extend(corpus.load_issues.iter().cloned());

    CoherenceReport {
        session_primer: format!(
            "{} {} Model analysis skipped; review the corpus manually.",
            excerpt, FALLBACK_MARKER
        ),
        open_risks,
        queued_focus: "Check the model service with `sp models`, then re-run `sp session start`.".to_string(),
        constitutional_flags: flags,
        corpus_hash: corpus.corpus_hash.clone(),
    }
}
