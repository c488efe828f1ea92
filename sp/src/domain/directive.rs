//! Directive: ready-to-execute instructions for the coding session

use serde::{Deserialize, Serialize};

use super::{Confidence, clean_list};
use crate::extract::{Contract, ContractError};

/// Opening line of every directive; whatever the model writes is replaced
pub const DIRECTIVE_PREAMBLE: &str = "Run `sp handoff`.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    #[serde(default)]
    pub session_id: String,

    pub title: String,

    #[serde(default)]
    pub preamble: String,

    /// What to know before touching code: patterns, locations, schemas
    #[serde(default)]
    pub context: String,

    /// Atomic, verifiable steps
    pub tasks: Vec<String>,

    /// Test command and manual smoke steps
    pub verification: String,

    pub commit_message: String,

    #[serde(default)]
    pub confidence: Confidence,
}

impl Directive {
    pub fn to_markdown(&self) -> String {
        let mut out = format!("**Session:** {}  \n**Confidence:** {}\n\n", self.session_id, self.confidence);
        out.push_str("## Preamble\n\n");
        out.push_str(&self.preamble);
        out.push_str("\n\n## Context\n\n");
        out.push_str(if self.context.is_empty() { "_none_" } else { &self.context });
        out.push_str("\n\n## Tasks\n\n");
        for task in &self.tasks {
            out.push_str(&format!("- {}\n", task));
        }
        out.push_str("\n## Verification\n\n");
        out.push_str(&self.verification);
        out.push_str("\n\n## Commit\n\n");
        out.push_str(&format!("`{}`\n", self.commit_message));
        out
    }
}

impl Contract for Directive {
    fn check(&self) -> Result<(), ContractError> {
        if self.title.is_empty() {
            return Err(ContractError::invalid("title", "must not be empty"));
        }
        if self.tasks.is_empty() {
            return Err(ContractError::invalid("tasks", "must list at least one task"));
        }
        if self.verification.is_empty() {
            return Err(ContractError::invalid("verification", "must not be empty"));
        }
        if self.commit_message.is_empty() {
            return Err(ContractError::invalid("commit_message", "must not be empty"));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.session_id = self.session_id.trim().to_string();
        self.title = self.title.trim().to_string();
        self.context = self.context.trim().to_string();
        self.verification = self.verification.trim().to_string();
        self.commit_message = self.commit_message.trim().to_string();
        clean_list(&mut self.tasks);
        self.preamble = DIRECTIVE_PREAMBLE.to_string();
    }
}
