//! JournalDraft: the proposed record of a closed session

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Confidence, bullets, clean_list};
use crate::approval::Approver;
use crate::extract::{Contract, ContractError};

/// What the model is asked to produce; ids, date and test count are filled in locally
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DraftProposal {
    pub summary: String,
    #[serde(default)]
    pub committed: Vec<String>,
    #[serde(default)]
    pub tasks_completed: Vec<String>,
    #[serde(default)]
    pub tasks_added: Vec<String>,
    #[serde(default)]
    pub confidence: Confidence,
}

impl Contract for DraftProposal {
    fn check(&self) -> Result<(), ContractError> {
        if self.summary.is_empty() {
            return Err(ContractError::invalid("summary", "must not be empty"));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.summary = self.summary.trim().to_string();
        clean_list(&mut self.committed);
        clean_list(&mut self.tasks_completed);
        clean_list(&mut self.tasks_added);
    }
}

/// Journal entry awaiting human approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalDraft {
    /// Next unused `S###` id
    pub session_id: String,
    /// ISO date the session closed
    pub date: String,
    /// Test count from the enumeration probe
    pub test_floor: u32,
    pub summary: String,
    /// Short commit hashes
    pub committed: Vec<String>,
    pub tasks_completed: Vec<String>,
    pub tasks_added: Vec<String>,
    pub confidence: Confidence,
}

impl JournalDraft {
    /// Ask the approver; only an approved draft can be written to the store
    ///
    /// A denied draft is handed back unchanged.
    pub fn approve(self, approver: &dyn Approver) -> Result<ApprovedDraft, JournalDraft> {
        debug!(session_id = %self.session_id, "JournalDraft::approve: called");
        let prompt = format!(
            "Write journal entry {} and mark {} task(s) DONE?",
            self.session_id,
            self.tasks_completed.len()
        );
        if approver.confirm(&prompt) {
            info!(session_id = %self.session_id, "Journal draft approved");
            Ok(ApprovedDraft(self))
        } else {
            info!(session_id = %self.session_id, "Journal draft not approved");
            Err(self)
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "**Date:** {}  \n**Test floor:** {}  \n**Confidence:** {}\n\n",
            self.date, self.test_floor, self.confidence
        );
        out.push_str("## Summary\n\n");
        out.push_str(&self.summary);
        out.push_str("\n\n## Committed\n\n");
        out.push_str(&bullets(&self.committed, "none"));
        out.push_str("\n## Tasks Completed\n\n");
        out.push_str(&bullets(&self.tasks_completed, "none"));
        out.push_str("\n## Tasks Added\n\n");
        out.push_str(&bullets(&self.tasks_added, "none"));
        out
    }
}

/// A draft a human has approved; the only input the store accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedDraft(JournalDraft);

impl ApprovedDraft {
    pub fn draft(&self) -> &JournalDraft {
        &self.0
    }
}
