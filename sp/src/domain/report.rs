//! CoherenceReport: the analyst's view of the project state

use serde::{Deserialize, Serialize};

use super::{bullets, clean_list};
use crate::extract::{Contract, ContractError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoherenceReport {
    /// Two-sentence summary of where the project stands
    pub session_primer: String,

    /// Blockers, drift, orphaned goals, broken references
    #[serde(default)]
    pub open_risks: Vec<String>,

    /// Single top-priority recommendation for this session
    pub queued_focus: String,

    /// Rule violations; always includes every deterministic violation
    #[serde(default)]
    pub constitutional_flags: Vec<String>,

    /// Hash of the corpus the report was built from
    #[serde(default)]
    pub corpus_hash: String,
}

impl CoherenceReport {
    /// Merge deterministic flags in front of the model's, removing duplicates
    pub fn merge_flags(&mut self, deterministic: &[String]) {
        let mut merged: Vec<String> = Vec::with_capacity(deterministic.len() + self.constitutional_flags.len());
        for flag in deterministic.iter().chain(self.constitutional_flags.iter()) {
            if !merged.iter().any(|m| m == flag) {
                merged.push(flag.clone());
            }
        }
        self.constitutional_flags = merged;
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("## Session Primer\n\n");
        out.push_str(&self.session_primer);
        out.push_str("\n\n## Open Risks\n\n");
        out.push_str(&bullets(&self.open_risks, "none"));
        out.push_str("\n## Queued Focus\n\n");
        out.push_str(&self.queued_focus);
        out.push_str("\n\n## Constitutional Flags\n\n");
        out.push_str(&bullets(&self.constitutional_flags, "none"));
        out.push_str(&format!("\n**Corpus hash:** `{}`\n", self.corpus_hash));
        out
    }
}

impl Contract for CoherenceReport {
    fn check(&self) -> Result<(), ContractError> {
        if self.session_primer.is_empty() {
            return Err(ContractError::invalid("session_primer", "must not be empty"));
        }
        if self.queued_focus.is_empty() {
            return Err(ContractError::invalid("queued_focus", "must not be empty"));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.session_primer = self.session_primer.trim().to_string();
        self.queued_focus = self.queued_focus.trim().to_string();
        clean_list(&mut self.open_risks);
        clean_list(&mut self.constitutional_flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::decode;

    #[test]
    fn test_decode_report() {
        let raw = r#"Here is the report:
{"session_primer": "Things are fine.", "open_risks": ["G3 orphaned", ""], "queued_focus": "Link G3", "constitutional_flags": []}"#;
        let report: CoherenceReport = decode(raw).unwrap();
        assert_eq!(report.open_risks, vec!["G3 orphaned"]);
        assert!(report.corpus_hash.is_empty());
    }

    #[test]
    fn test_empty_primer_rejected() {
        let raw = r#"{"session_primer": "  ", "queued_focus": "x"}"#;
        assert!(decode::<CoherenceReport>(raw).is_err());
    }

    #[test]
    fn test_merge_flags_dedups_deterministic_first() {
        let mut report = CoherenceReport {
            session_primer: "p".to_string(),
            open_risks: vec![],
            queued_focus: "q".to_string(),
            constitutional_flags: vec!["model flag".to_string(), "RULE 4 VIOLATION: x".to_string()],
            corpus_hash: String::new(),
        };
        report.merge_flags(&["RULE 4 VIOLATION: x".to_string()]);
        assert_eq!(report.constitutional_flags, vec!["RULE 4 VIOLATION: x", "model flag"]);
    }

    #[test]
    fn test_markdown_sections() {
        let report = CoherenceReport {
            session_primer: "Primer".to_string(),
            open_risks: vec!["risk".to_string()],
            queued_focus: "Focus".to_string(),
            constitutional_flags: vec![],
            corpus_hash: "abc".to_string(),
        };
        let md = report.to_markdown();
        assert!(md.contains("- risk"));
        assert!(md.contains("## Constitutional Flags\n\n- none"));
        assert!(md.contains("`abc`"));
    }
}
