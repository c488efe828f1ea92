//! SessionPilot - resilient developer-session pipeline
//!
//! Four stages turn a project's planning documents into guidance for one work
//! session and, afterwards, into a journal entry. Each stage makes at most one
//! call to a local model and falls back to a deterministic artifact when the
//! model is down or its answer does not fit the expected shape.
//!
//! # Modules
//!
//! - [`corpus`] - Planning documents, hashing and the deterministic rule check
//! - [`stages`] - Analyst, Planner, DirectiveWriter and Journalist
//! - [`llm`] - Chat-completion client and model-ladder resolution
//! - [`extract`] - Structured output extraction and contracts
//! - [`store`] - The one write path into the planning documents
//! - [`escalation`] - Approval-gated calls to a remote model
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod approval;
pub mod cli;
pub mod config;
pub mod context;
pub mod corpus;
pub mod domain;
pub mod escalation;
pub mod extract;
pub mod llm;
pub mod probes;
pub mod prompts;
pub mod session_log;
pub mod stages;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use corpus::{Corpus, CorpusBuilder, ValidationReport, validate};
pub use domain::{ApprovedDraft, CoherenceReport, Directive, JournalDraft, SessionPlan};
pub use escalation::{EscalationGate, EscalationOutcome};
pub use llm::{LlmClient, LlmError};
pub use stages::{Analyst, DirectiveWriter, Journalist, PipelineContext, Planner, StageOutcome, StageRun};
pub use store::PlanningStore;
