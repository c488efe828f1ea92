//! SessionPlan: one recommended option and two alternatives

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{bullets, clean_list};
use crate::extract::{Contract, ContractError};

/// Role of an option in the plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionLabel {
    /// Direct path on the most important active milestone
    Headlong,
    /// Address an open risk first
    Divert,
    /// Smaller, independent piece of work
    Alt,
}

impl OptionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Headlong => "Headlong",
            Self::Divert => "Divert",
            Self::Alt => "Alt",
        }
    }
}

impl std::str::FromStr for OptionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "headlong" => Ok(Self::Headlong),
            "divert" => Ok(Self::Divert),
            "alt" => Ok(Self::Alt),
            other => Err(format!("unknown option label '{}' (expected Headlong, Divert or Alt)", other)),
        }
    }
}

impl std::fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for OptionLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OptionLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Risk of taking an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl std::str::FromStr for Risk {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown risk '{}' (expected Low, Medium or High)", other)),
        }
    }
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Risk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Risk {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One ranked option in a session plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOption {
    pub label: OptionLabel,
    pub title: String,
    #[serde(default)]
    pub rationale: String,
    /// Concrete ordered steps
    pub tasks: Vec<String>,
    pub risk: Risk,
    /// Milestone this option advances
    #[serde(default)]
    pub milestone_impact: String,
}

impl SessionOption {
    fn check(&self, field: &str) -> Result<(), ContractError> {
        if self.title.is_empty() {
            return Err(ContractError::invalid(format!("{}.title", field), "must not be empty"));
        }
        if self.tasks.is_empty() {
            return Err(ContractError::invalid(format!("{}.tasks", field), "must list at least one task"));
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        self.rationale = self.rationale.trim().to_string();
        self.milestone_impact = self.milestone_impact.trim().to_string();
        clean_list(&mut self.tasks);
    }

    fn to_markdown(&self, heading: &str) -> String {
        let mut out = format!(
            "### {} {}: {} [{} Risk]\n\n",
            heading,
            self.label.as_str().to_uppercase(),
            self.title,
            self.risk
        );
        if !self.milestone_impact.is_empty() {
            out.push_str(&format!("**Advances:** {}\n\n", self.milestone_impact));
        }
        if !self.rationale.is_empty() {
            out.push_str(&format!("{}\n\n", self.rationale));
        }
        for (i, task) in self.tasks.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, task));
        }
        out.push('\n');
        out
    }
}

/// Ranked plan for the coming session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlan {
    pub recommended: SessionOption,

    /// Exactly two: the Divert option, then the Alt option
    pub alternatives: Vec<SessionOption>,

    /// Decisions only the operator can make before work begins
    #[serde(default)]
    pub open_questions: Vec<String>,

    /// Which report risks the plan addresses
    #[serde(default, alias = "archivist_risks_addressed")]
    pub risks_addressed: Vec<String>,

    /// Carried from the report
    #[serde(default)]
    pub corpus_hash: String,
}

impl SessionPlan {
    pub fn divert(&self) -> Option<&SessionOption> {
        self.alternatives.iter().find(|o| o.label == OptionLabel::Divert)
    }

    pub fn alt(&self) -> Option<&SessionOption> {
        self.alternatives.iter().find(|o| o.label == OptionLabel::Alt)
    }

    /// All three options, recommended first
    pub fn options(&self) -> impl Iterator<Item = &SessionOption> {
        std::iter::once(&self.recommended).chain(self.alternatives.iter())
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::from("## Session Options\n\n");
        out.push_str(&self.recommended.to_markdown("[R]"));
        for alt in &self.alternatives {
            let heading = if alt.label == OptionLabel::Divert { "[D]" } else { "[A]" };
            out.push_str(&alt.to_markdown(heading));
        }
        out.push_str("## Open Questions\n\n");
        out.push_str(&bullets(&self.open_questions, "none"));
        out.push_str("\n## Risks Addressed\n\n");
        out.push_str(&bullets(&self.risks_addressed, "none explicitly addressed"));
        out.push_str(&format!("\n**Corpus hash:** `{}`\n", self.corpus_hash));
        out
    }
}

impl Contract for SessionPlan {
    fn check(&self) -> Result<(), ContractError> {
        if self.recommended.label != OptionLabel::Headlong {
            return Err(ContractError::invalid(
                "recommended.label",
                format!("must be Headlong (got {})", self.recommended.label),
            ));
        }
        self.recommended.check("recommended")?;

        if self.alternatives.len() != 2 {
            return Err(ContractError::invalid(
                "alternatives",
                format!("must hold exactly two options (got {})", self.alternatives.len()),
            ));
        }
        if self.alternatives[0].label != OptionLabel::Divert || self.alternatives[1].label != OptionLabel::Alt {
            return Err(ContractError::invalid("alternatives", "must be one Divert and one Alt"));
        }
        for (i, alt) in self.alternatives.iter().enumerate() {
            alt.check(&format!("alternatives[{}]", i))?;
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.recommended.normalize();
        for alt in &mut self.alternatives {
            alt.normalize();
        }
        // Divert first, Alt second; a stable sort keeps anything else where the check will see it
        self.alternatives.sort_by_key(|o| match o.label {
            OptionLabel::Divert => 0,
            OptionLabel::Alt => 1,
            OptionLabel::Headlong => 2,
        });
        clean_list(&mut self.open_questions);
        clean_list(&mut self.risks_addressed);
    }
}
