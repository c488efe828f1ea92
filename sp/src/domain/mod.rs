//! Domain types for SessionPilot
//!
//! The artifacts each stage produces: CoherenceReport, SessionPlan, Directive,
//! JournalDraft. Each implements `Contract` so model output can be checked
//! before it is trusted, and renders itself as a markdown session log.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

mod directive;
mod journal;
mod plan;
mod report;

pub use directive::{DIRECTIVE_PREAMBLE, Directive};
pub use journal::{ApprovedDraft, DraftProposal, JournalDraft};
pub use plan::{OptionLabel, Risk, SessionOption, SessionPlan};
pub use report::CoherenceReport;

/// How much the producer trusts an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::str::FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            other => Err(format!("unknown confidence '{}' (expected high, medium or low)", other)),
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Trim every entry and drop the empty ones
pub(crate) fn clean_list(items: &mut Vec<String>) {
    for item in items.iter_mut() {
        *item = item.trim().to_string();
    }
    items.retain(|i| !i.is_empty());
}

/// Markdown bullet list, or a placeholder line when empty
pub(crate) fn bullets(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        return format!("- {}\n", empty);
    }
    items.iter().map(|i| format!("- {}\n", i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_parse() {
        assert_eq!("HIGH".parse::<Confidence>(), Ok(Confidence::High));
        assert_eq!(" low ".parse::<Confidence>(), Ok(Confidence::Low));
        assert!("certain".parse::<Confidence>().is_err());
    }

    #[test]
    fn test_confidence_serde() {
        let c: Confidence = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(c, Confidence::Medium);
        assert_eq!(serde_json::to_string(&Confidence::Low).unwrap(), "\"low\"");
    }

    #[test]
    fn test_clean_list() {
        let mut items = vec!["  a ".to_string(), "".to_string(), "   ".to_string(), "b".to_string()];
        clean_list(&mut items);
        assert_eq!(items, vec!["a", "b"]);
    }

    #[test]
    fn test_bullets_placeholder() {
        assert_eq!(bullets(&[], "none"), "- none\n");
        assert_eq!(bullets(&["x".to_string()], "none"), "- x\n");
    }
}
