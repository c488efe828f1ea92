//! DirectiveWriter: recommended option plus code context to Directive

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{FALLBACK_MARKER, PipelineContext, StageOutcome, StageRun};
use crate::context::{CodebaseContext, ContextSource};
use crate::corpus::short_hash;
use crate::domain::{Confidence, DIRECTIVE_PREAMBLE, Directive, SessionPlan};

const STAGE: &str = "directive";
const TEMPERATURE: f32 = 0.3;
/// Session id used when the plan carries no corpus hash
const FALLBACK_SESSION_ID: &str = "FALLBACK";

pub struct DirectiveWriter {
    ctx: Arc<PipelineContext>,
    context_source: Box<dyn ContextSource>,
}

impl DirectiveWriter {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        debug!("DirectiveWriter::new: called");
        let context_source = Box::new(CodebaseContext::new(ctx.root.clone()));
        Self { ctx, context_source }
    }

    pub fn with_context_source(mut self, source: Box<dyn ContextSource>) -> Self {
        self.context_source = source;
        self
    }

    /// Turn the plan's recommended option into executable instructions
    pub async fn run(&self, plan: &SessionPlan) -> StageRun<Directive> {
        let option = &plan.recommended;
        debug!(title = %option.title, "DirectiveWriter::run: called");

        let code_context = match self.context_source.build(&option.title) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Code context unavailable; continuing without it");
                String::new()
            }
        };

        let session_id = default_session_id(plan);
        let prompt_ctx = self.ctx.prompt_context().with_session_id(&session_id);
        let user = build_prompt(plan, &code_context);

        let outcome = match self
            .ctx
            .consult::<Directive>(STAGE, &prompt_ctx, user, TEMPERATURE)
            .await
        {
            Ok(mut directive) => {
                directive.preamble = DIRECTIVE_PREAMBLE.to_string();
                if directive.session_id.is_empty() {
                    directive.session_id = session_id;
                }
                let ungrounded = ungrounded_paths(&self.ctx.root, &directive.tasks);
                if !ungrounded.is_empty() && directive.confidence == Confidence::High {
                    warn!(?ungrounded, "Directive names paths missing from the codebase; lowering confidence");
                    directive.confidence = Confidence::Medium;
                }
                info!(title = %directive.title, confidence = %directive.confidence, "Directive ready");
                StageOutcome::Normal(directive)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(%reason, "Directive writer degraded to fallback directive");
                StageOutcome::Degraded {
                    artifact: fallback_directive(plan, session_id, self.ctx.config.rules.test_floor),
                    reason,
                }
            }
        };

        let directive = outcome.artifact();
        let saved = self
            .ctx
            .persist(STAGE, &directive.title, outcome.reason(), &directive.to_markdown());
        StageRun { outcome, saved }
    }
}

fn default_session_id(plan: &SessionPlan) -> String {
    let short = short_hash(&plan.corpus_hash);
    if short.is_empty() {
        FALLBACK_SESSION_ID.to_string()
    } else {
        short.to_string()
    }
}

fn build_prompt(plan: &SessionPlan, code_context: &str) -> String {
    let option = &plan.recommended;
    let mut out = String::from("Write the directive for this session option.\n\n");
    out.push_str(&format!("TITLE: {}\n", option.title));
    out.push_str(&format!("RISK: {}\n", option.risk));
    if !option.milestone_impact.is_empty() {
        out.push_str(&format!("ADVANCES: {}\n", option.milestone_impact));
    }
    if !option.rationale.is_empty() {
        out.push_str(&format!("RATIONALE: {}\n", option.rationale));
    }

    out.push_str("\nTASKS:\n");
    for (i, task) in option.tasks.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, task));
    }

    if !plan.open_questions.is_empty() {
        out.push_str("\nOPEN QUESTIONS:\n");
        for question in &plan.open_questions {
            out.push_str(&format!("  - {}\n", question));
        }
    }

    out.push_str("\nCODE CONTEXT:\n");
    if code_context.trim().is_empty() {
        out.push_str("  none found; do not guess file paths\n");
    } else {
        out.push_str(code_context);
        out.push('\n');
    }
    out
}

/// Path-like tokens in tasks that match nothing in the project tree
///
/// A path counts as grounded when it exists or its parent directory does, so
/// tasks that create a new file next to existing code stay grounded.
pub fn ungrounded_paths(root: &Path, tasks: &[String]) -> Vec<String> {
    debug!(?root, tasks = tasks.len(), "ungrounded_paths: called");
    let mut missing = Vec::new();
    for task in tasks {
        for token in task.split_whitespace() {
            let candidate = token
                .trim_matches(|c: char| matches!(c, '`' | '\'' | '"' | '(' | ')' | '[' | ']' | ',' | ';' | ':'))
                .trim_end_matches('.');
            if !candidate.contains('/') || candidate.contains("://") || candidate.starts_with('-') {
                continue;
            }
            let path = root.join(candidate.trim_start_matches('/'));
            let parent_exists = path.parent().is_some_and(|p| p != root && p.is_dir());
            if !path.exists() && !parent_exists && !missing.iter().any(|m| m == candidate) {
                missing.push(candidate.to_string());
            }
        }
    }
    missing
}

/// Directive built without the model from the recommended option alone
pub(crate) fn fallback_directive(plan: &SessionPlan, session_id: String, test_floor: u32) -> Directive {
    debug!(%session_id, "fallback_directive: called");
    let option = &plan.recommended;
    let milestone = if option.milestone_impact.is_empty() {
        "unspecified"
    } else {
        option.milestone_impact.as_str()
    };

    Directive {
        session_id,
        title: option.title.clone(),
        preamble: DIRECTIVE_PREAMBLE.to_string(),
        context: format!(
            "{} Planner recommended: {}. Milestone: {}. Tasks are copied from the plan unchanged; check any file paths against the codebase before editing.",
            FALLBACK_MARKER, option.title, milestone
        ),
        tasks: option.tasks.clone(),
        verification: format!(
            "Run the full test suite; the count must stay at or above {}.",
            test_floor
        ),
        commit_message: format!("feat: {}", option.title.to_lowercase().replace(' ', "-")),
        confidence: Confidence::Low,
    }
}
