//! Planner: CoherenceReport to SessionPlan

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{FALLBACK_MARKER, PipelineContext, StageError, StageOutcome, StageRun};
use crate::domain::{CoherenceReport, OptionLabel, Risk, SessionOption, SessionPlan};
use crate::extract::ContractError;

const STAGE: &str = "planner";
const TEMPERATURE: f32 = 0.3;

pub struct Planner {
    ctx: Arc<PipelineContext>,
}

impl Planner {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        debug!("Planner::new: called");
        Self { ctx }
    }

    /// Rank three options for the session; the plan never reads the corpus directly
    pub async fn run(&self, report: &CoherenceReport) -> StageRun<SessionPlan> {
        debug!(risks = report.open_risks.len(), "Planner::run: called");
        let user = build_prompt(report);

        let result = self
            .ctx
            .consult::<SessionPlan>(STAGE, &self.ctx.prompt_context(), user, TEMPERATURE)
            .await
            .and_then(|plan| check_risks_addressed(plan, report));

        let outcome = match result {
            Ok(mut plan) => {
                plan.corpus_hash = report.corpus_hash.clone();
                info!(recommended = %plan.recommended.title, "Session plan ready");
                StageOutcome::Normal(plan)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(%reason, "Planner degraded to fallback plan");
                StageOutcome::Degraded {
                    artifact: fallback_plan(report, &self.ctx.config.llm.base_url),
                    reason,
                }
            }
        };

        let saved = self
            .ctx
            .persist(STAGE, "Session Plan", outcome.reason(), &outcome.artifact().to_markdown());
        StageRun { outcome, saved }
    }
}

/// A plan for a report with open risks must say which it addresses
fn check_risks_addressed(plan: SessionPlan, report: &CoherenceReport) -> Result<SessionPlan, StageError> {
    if !report.open_risks.is_empty() && plan.risks_addressed.is_empty() {
        return Err(ContractError::invalid("risks_addressed", "must name at least one open risk").into());
    }
    Ok(plan)
}

fn build_prompt(report: &CoherenceReport) -> String {
    let mut out = String::from("Plan this session from the analyst report.\n\n");
    out.push_str(&format!("SESSION PRIMER:\n{}\n\n", report.session_primer));

    out.push_str("OPEN RISKS:\n");
    if report.open_risks.is_empty() {
        out.push_str("  none\n");
    }
    for (i, risk) in report.open_risks.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, risk));
    }

    out.push_str(&format!("\nQUEUED FOCUS:\n{}\n\n", report.queued_focus));

    out.push_str("CONSTITUTIONAL FLAGS:\n");
    if report.constitutional_flags.is_empty() {
        out.push_str("  none\n");
    }
    for flag in &report.constitutional_flags {
        out.push_str(&format!("  {}\n", flag));
    }
    out
}

/// Plan built without the model: review the report, restore the connection, or work by hand
pub(crate) fn fallback_plan(report: &CoherenceReport, base_url: &str) -> SessionPlan {
    debug!("fallback_plan: called");
    SessionPlan {
        recommended: SessionOption {
            label: OptionLabel::Headlong,
            title: "Review analyst findings".to_string(),
            rationale: format!(
                "{} The planner could not reach the model. Work from the analyst report instead.",
                FALLBACK_MARKER
            ),
            tasks: vec![
                "Read the latest analyst report in the session logs".to_string(),
                format!("Triage the {} open risk(s) by hand", report.open_risks.len()),
                format!("Pick the next task from the queued focus: {}", report.queued_focus),
            ],
            risk: Risk::Low,
            milestone_impact: "None directly; keeps the session moving".to_string(),
        },
        alternatives: vec![
            SessionOption {
                label: OptionLabel::Divert,
                title: "Restore model connection".to_string(),
                rationale: "Every stage degrades until the local model service answers again.".to_string(),
                tasks: vec![
                    format!("Check the model service is listening at {}", base_url),
                    "Install a model from the ladder if none is listed".to_string(),
                    "Run `sp models` and confirm a model resolves".to_string(),
                    "Re-run `sp session start`".to_string(),
                ],
                risk: Risk::Low,
                milestone_impact: "Restores planning for later sessions".to_string(),
            },
            SessionOption {
                label: OptionLabel::Alt,
                title: "Manual journal update".to_string(),
                rationale: "Record the current state without the model.".to_string(),
                tasks: vec![
                    "Run `sp handoff` to review the latest directive".to_string(),
                    "Run `sp corpus validate` and fix any violations".to_string(),
                    "Run `sp session end` and review the draft before approving".to_string(),
                ],
                risk: Risk::Low,
                milestone_impact: "Keeps the journal current".to_string(),
            },
        ],
        open_questions: vec!["Is the local model service running? Check with `sp models`.".to_string()],
        risks_addressed: Vec::new(),
        corpus_hash: report.corpus_hash.clone(),
    }
}
