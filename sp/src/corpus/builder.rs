//! Corpus loading and hashing

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{Corpus, JournalEntry, Record};
use crate::config::PathsConfig;

pub const GOALS_FILE: &str = "goals.yaml";
pub const MILESTONES_FILE: &str = "milestones.yaml";
pub const TASKS_FILE: &str = "tasks.yaml";
pub const SESSIONS_FILE: &str = "sessions.yaml";
pub const JOURNAL_FILE: &str = "journal.yaml";

/// Builds a `Corpus` from the planning documents under a project root
#[derive(Debug, Clone)]
pub struct CorpusBuilder {
    planning_dir: PathBuf,
    journal_dir: PathBuf,
}

impl CorpusBuilder {
    pub fn new(root: impl AsRef<Path>, paths: &PathsConfig) -> Self {
        let root = root.as_ref();
        debug!(?root, "CorpusBuilder::new: called");
        Self {
            planning_dir: root.join(&paths.planning_dir),
            journal_dir: root.join(&paths.journal_dir),
        }
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.planning_dir.join(TASKS_FILE)
    }

    pub fn journal_path(&self) -> PathBuf {
        self.journal_dir.join(JOURNAL_FILE)
    }

    /// Parse every document and hash the result
    ///
    /// Never fails: a missing document is an empty collection, a malformed one
    /// is an empty collection plus an entry in `load_issues`.
    pub fn build(&self) -> Corpus {
        debug!(planning_dir = ?self.planning_dir, journal_dir = ?self.journal_dir, "CorpusBuilder::build: called");
        let mut issues = Vec::new();

        let goals: Vec<Record> = load_section(&self.planning_dir.join(GOALS_FILE), &mut issues);
        let milestones: Vec<Record> = load_section(&self.planning_dir.join(MILESTONES_FILE), &mut issues);
        let tasks: Vec<Record> = load_section(&self.tasks_path(), &mut issues);
        let sessions: Vec<Record> = load_section(&self.planning_dir.join(SESSIONS_FILE), &mut issues);
        let journal: Vec<JournalEntry> = load_section(&self.journal_path(), &mut issues);

        let mut corpus = Corpus {
            goals,
            milestones,
            tasks,
            sessions,
            journal,
            corpus_hash: String::new(),
            load_issues: issues,
        };
        corpus.corpus_hash = hash_corpus(&corpus);

        info!(
            goals = corpus.goals.len(),
            milestones = corpus.milestones.len(),
            tasks = corpus.tasks.len(),
            journal = corpus.journal.len(),
            issues = corpus.load_issues.len(),
            hash = %short_hash(&corpus.corpus_hash),
            "Corpus built"
        );
        corpus
    }
}

/// Load one YAML list document, skipping items that do not fit `T`
fn load_section<T: DeserializeOwned>(path: &Path, issues: &mut Vec<String>) -> Vec<T> {
    debug!(?path, "load_section: called");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    if !path.exists() {
        debug!(%name, "load_section: missing, treating as empty");
        return Vec::new();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(%name, error = %e, "Failed to read planning document");
            issues.push(format!("{}: unreadable ({})", name, e));
            return Vec::new();
        }
    };

    let document: serde_yaml::Value = match serde_yaml::from_str(&content) {
        Ok(document) => document,
        Err(e) => {
            warn!(%name, error = %e, "Malformed planning document");
            issues.push(format!("{}: malformed YAML ({})", name, e));
            return Vec::new();
        }
    };

    let items = match document {
        serde_yaml::Value::Null => return Vec::new(),
        serde_yaml::Value::Sequence(items) => items,
        _ => {
            warn!(%name, "Planning document is not a list");
            issues.push(format!("{}: expected a list of records", name));
            return Vec::new();
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.into_iter().enumerate() {
        match serde_yaml::from_value::<T>(item) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(%name, item = idx + 1, error = %e, "Skipping malformed record");
                issues.push(format!("{}: record {} skipped ({})", name, idx + 1, e));
            }
        }
    }
    records
}

/// SHA-256 over an order-independent canonical serialisation
///
/// Each section is sorted by record id (ties broken by content) and rendered as
/// JSON with object keys sorted, so reordering records or keys in the source
/// documents leaves the hash unchanged.
pub fn hash_corpus(corpus: &Corpus) -> String {
    debug!("hash_corpus: called");
    let sections = [
        ("goals", canonical_section(&corpus.goals, |r| r.id.as_str())),
        ("milestones", canonical_section(&corpus.milestones, |r| r.id.as_str())),
        ("tasks", canonical_section(&corpus.tasks, |r| r.id.as_str())),
        ("sessions", canonical_section(&corpus.sessions, |r| r.id.as_str())),
        ("journal", canonical_section(&corpus.journal, |e| e.id.as_str())),
    ];

    let mut hasher = Sha256::new();
    for (name, records) in sections {
        hasher.update(name.as_bytes());
        hasher.update(b"\n");
        for record in records {
            hasher.update(record.as_bytes());
            hasher.update(b"\n");
        }
    }

    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// First eight characters of a hash, for display
pub fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

fn canonical_section<T: Serialize>(records: &[T], id: impl Fn(&T) -> &str) -> Vec<String> {
    let mut rendered: Vec<(String, String)> = records
        .iter()
        .map(|r| {
            let text = serde_json::to_value(r)
                .map(|v| canonical_json(&v))
                .unwrap_or_default();
            (id(r).to_string(), text)
        })
        .collect();
    rendered.sort();
    rendered.into_iter().map(|(_, text)| text).collect()
}

/// Render JSON with object keys sorted at every level
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}
