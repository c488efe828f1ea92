//! Typed view of the planning documents

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

/// Status of a planning record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    Active,
    Queued,
    Blocked,
    Done,
    Deferred,
    #[default]
    Unknown,
}

impl Status {
    /// Case-insensitive parse; anything unrecognised is `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Self::Active,
            "QUEUED" => Self::Queued,
            "BLOCKED" => Self::Blocked,
            "DONE" => Self::Done,
            "DEFERRED" => Self::Deferred,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Queued => "QUEUED",
            Self::Blocked => "BLOCKED",
            Self::Done => "DONE",
            Self::Deferred => "DEFERRED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Read an unquoted number or boolean as text, e.g. `id: 7` or `title: 2024`
fn scalar_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Bool(b) => b.to_string(),
    })
}

/// One goal, milestone, task or session record
///
/// Fields outside the typed view are kept in `extra` so they take part in the
/// corpus hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(deserialize_with = "scalar_text")]
    pub id: String,

    #[serde(default, deserialize_with = "scalar_text")]
    pub title: String,

    #[serde(default)]
    pub status: Status,

    /// Application the record belongs to, or the shared scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(default)]
    pub description: String,

    /// Unit kind, e.g. the scene kind checked by the template rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Template a scene unit derives from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Ids of records this one waits on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// Minimal record, used by tests and fallbacks
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: Status) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status,
            scope: None,
            description: String::new(),
            kind: None,
            template: None,
            depends_on: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// One journal entry, the record of a closed session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(deserialize_with = "scalar_text")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    /// Test count recorded when the session closed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_floor: Option<u32>,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub committed: Vec<String>,

    #[serde(default)]
    pub tasks_completed: Vec<String>,

    #[serde(default)]
    pub tasks_added: Vec<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The project's planning state, rebuilt from scratch on every run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    pub goals: Vec<Record>,
    pub milestones: Vec<Record>,
    pub tasks: Vec<Record>,
    pub sessions: Vec<Record>,
    /// Journal entries in file order, oldest first
    pub journal: Vec<JournalEntry>,
    /// SHA-256 over the normalised documents
    pub corpus_hash: String,
    /// Human-readable problems met while loading; never fatal
    pub load_issues: Vec<String>,
}

impl Corpus {
    /// Most recently appended journal entry
    pub fn latest_journal(&self) -> Option<&JournalEntry> {
        self.journal.last()
    }

    /// Test count of the latest journal entry that recorded one
    pub fn latest_test_floor(&self) -> Option<u32> {
        self.journal.iter().rev().find_map(|e| e.test_floor)
    }

    pub fn task(&self, id: &str) -> Option<&Record> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Any goal, milestone, task or session with this id
    pub fn find(&self, id: &str) -> Option<&Record> {
        self.goals
            .iter()
            .chain(&self.milestones)
            .chain(&self.tasks)
            .chain(&self.sessions)
            .find(|r| r.id == id)
    }

    pub fn active_tasks(&self) -> impl Iterator<Item = &Record> {
        self.tasks.iter().filter(|t| t.status == Status::Active)
    }

    /// Next unused session id across journal and session records
    pub fn next_session_id(&self) -> String {
        next_session_id(
            self.journal
                .iter()
                .map(|e| e.id.as_str())
                .chain(self.sessions.iter().map(|s| s.id.as_str())),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
            && self.milestones.is_empty()
            && self.tasks.is_empty()
            && self.sessions.is_empty()
            && self.journal.is_empty()
    }

    /// Compact text view for prompts: counts, active work, latest journal entry
    pub fn summary(&self) -> String {
        debug!("Corpus::summary: called");
        let mut out = String::new();

        out.push_str(&format!(
            "COUNTS: {} goals, {} milestones, {} tasks, {} sessions, {} journal entries\n",
            self.goals.len(),
            self.milestones.len(),
            self.tasks.len(),
            self.sessions.len(),
            self.journal.len()
        ));

        out.push_str("\nGOALS:\n");
        push_records(&mut out, &self.goals, 10);

        out.push_str("\nMILESTONES:\n");
        push_records(&mut out, &self.milestones, 10);

        out.push_str("\nOPEN TASKS:\n");
        let open: Vec<Record> = self
            .tasks
            .iter()
            .filter(|t| !matches!(t.status, Status::Done))
            .cloned()
            .collect();
        push_records(&mut out, &open, 20);

        out.push_str("\nLATEST JOURNAL ENTRY:\n");
        match self.latest_journal() {
            Some(entry) => {
                out.push_str(&format!("  {}", entry.id));
                if let Some(floor) = entry.test_floor {
                    out.push_str(&format!(" (test floor {})", floor));
                }
                out.push_str(&format!(": {}\n", entry.summary.trim()));
            }
            None => out.push_str("  none\n"),
        }

        out
    }
}

fn push_records(out: &mut String, records: &[Record], limit: usize) {
    if records.is_empty() {
        out.push_str("  none\n");
        return;
    }
    for record in records.iter().take(limit) {
        out.push_str(&format!("  {} [{}]", record.id, record.status));
        if let Some(scope) = &record.scope {
            out.push_str(&format!(" ({})", scope));
        }
        out.push_str(&format!(": {}\n", record.title));
    }
    if records.len() > limit {
        out.push_str(&format!("  ... and {} more\n", records.len() - limit));
    }
}

/// Next session id given the ids already used
///
/// Ids of the form `S<digits>` (case-insensitive) count; the result is the
/// highest number plus one, zero-padded to three digits. Numbers with no
/// successor are ignored. No usable id gives `S001`.
pub fn next_session_id<'a>(existing: impl IntoIterator<Item = &'a str>) -> String {
    let next = existing
        .into_iter()
        .filter_map(|id| {
            let id = id.trim();
            let rest = id.strip_prefix('S').or_else(|| id.strip_prefix('s'))?;
            rest.parse::<u64>().ok()?.checked_add(1)
        })
        .max();
    format!("S{:03}", next.unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_status_parse_case_insensitive() {
        assert_eq!(Status::parse("active"), Status::Active);
        assert_eq!(Status::parse("Done"), Status::Done);
        assert_eq!(Status::parse(" QUEUED "), Status::Queued);
        assert_eq!(Status::parse("in_progress"), Status::Unknown);
    }

    #[test]
    fn test_record_keeps_unknown_fields() {
        let yaml = "id: T001\ntitle: Build\nstatus: active\npriority: P1\n";
        let record: Record = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(record.status, Status::Active);
        assert_eq!(record.extra.get("priority"), Some(&serde_json::json!("P1")));
    }

    #[test]
    fn test_numeric_id_and_title_read_as_text() {
        let record: Record = serde_yaml::from_str("id: 7\ntitle: 2024\nstatus: queued\nowner: sam\n").unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.title, "2024");
        assert_eq!(record.extra.get("owner"), Some(&serde_json::json!("sam")));

        let entry: JournalEntry = serde_yaml::from_str("id: 12\nsummary: s\n").unwrap();
        assert_eq!(entry.id, "12");
    }

    #[test]
    fn test_next_session_id_sequence() {
        let ids = ["S001", "S002", "S003", "S004", "S005"];
        assert_eq!(next_session_id(ids), "S006");
    }

    #[test]
    fn test_next_session_id_empty() {
        assert_eq!(next_session_id(std::iter::empty()), "S001");
    }

    #[test]
    fn test_next_session_id_ignores_unparsable() {
        assert_eq!(next_session_id(["S002", "SPRINT", "x7", "s010", ""]), "S011");
    }

    #[test]
    fn test_next_session_id_past_u32() {
        assert_eq!(next_session_id(["S4294967295"]), "S4294967296");
        assert_eq!(next_session_id(["S003", "S18446744073709551615"]), "S004");
        assert_eq!(next_session_id(["S99999999999999999999999"]), "S001");
    }

    #[test]
    fn test_corpus_next_session_id_uses_sessions_too() {
        let mut corpus = Corpus::default();
        corpus.sessions.push(Record::new("S009", "old", Status::Done));
        assert_eq!(corpus.next_session_id(), "S010");
    }

    #[test]
    fn test_summary_empty_corpus() {
        let summary = Corpus::default().summary();
        assert!(summary.contains("0 tasks"));
        assert!(summary.contains("LATEST JOURNAL ENTRY:\n  none"));
    }

    proptest! {
        #[test]
        fn prop_next_session_id_exceeds_all(nums in proptest::collection::vec(0u32..5000, 0..20)) {
            let ids: Vec<String> = nums.iter().map(|n| format!("S{:03}", n)).collect();
            let next = next_session_id(ids.iter().map(String::as_str));
            let n: u32 = next[1..].parse().unwrap();
            prop_assert!(next.len() >= 4);
            prop_assert!(nums.iter().all(|m| *m < n));
            prop_assert_eq!(n, nums.iter().max().map(|m| m + 1).unwrap_or(1));
        }
    }
}
