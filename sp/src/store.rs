//! Planning document writes
//!
//! The only code that mutates the corpus. Both documents are read and the new
//! contents fully computed before either file is touched; each file is then
//! replaced through a sibling temp file. Tasks go first since marking DONE can
//! be repeated; the journal entry, which blocks a retry, lands last.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use eyre::{Context, Result, bail};
use fs2::FileExt;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::domain::{ApprovedDraft, JournalDraft};

/// Recorded as the author of journal entries and task changes
pub const AUTHOR: &str = "journalist";

const DONE: &str = "DONE";

/// What an approved write changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub session_id: String,
    /// Task ids flipped to DONE
    pub tasks_marked_done: Vec<String>,
    pub journal_path: PathBuf,
    pub tasks_path: PathBuf,
}

/// Task and journal documents of one project
#[derive(Debug, Clone)]
pub struct PlanningStore {
    tasks_path: PathBuf,
    journal_path: PathBuf,
}

impl PlanningStore {
    pub fn new(tasks_path: impl Into<PathBuf>, journal_path: impl Into<PathBuf>) -> Self {
        let tasks_path = tasks_path.into();
        let journal_path = journal_path.into();
        debug!(?tasks_path, ?journal_path, "PlanningStore::new: called");
        Self {
            tasks_path,
            journal_path,
        }
    }

    /// Append the journal entry and mark completed tasks DONE
    pub fn approve_and_write(&self, approved: &ApprovedDraft) -> Result<WriteSummary> {
        let draft = approved.draft();
        debug!(session_id = %draft.session_id, "PlanningStore::approve_and_write: called");

        let _lock = StoreLock::acquire(&self.journal_path)?;

        let mut journal = read_list(&self.journal_path)?;
        if journal
            .iter()
            .any(|e| record_id(e).as_deref() == Some(draft.session_id.as_str()))
        {
            bail!(
                "Journal already has an entry for {}; refusing to write",
                draft.session_id
            );
        }
        journal.push(journal_entry(draft));

        let mut marked = Vec::new();
        let mut original_tasks = None;
        let tasks = if draft.tasks_completed.is_empty() {
            None
        } else if !self.tasks_path.exists() {
            warn!(path = %self.tasks_path.display(), "Task document missing; no tasks marked DONE");
            None
        } else {
            let original = fs::read_to_string(&self.tasks_path)
                .context(format!("Failed to read {}", self.tasks_path.display()))?;
            let mut tasks = parse_list(&self.tasks_path, &original)?;
            marked = mark_done(&mut tasks, draft);
            original_tasks = Some(original);
            Some(tasks)
        };

        let journal_text =
            serde_yaml::to_string(&Value::Sequence(journal)).context("Failed to serialise journal document")?;
        let tasks_text = tasks
            .map(|t| serde_yaml::to_string(&Value::Sequence(t)))
            .transpose()
            .context("Failed to serialise task document")?;

        if let Some(text) = &tasks_text {
            write_replace(&self.tasks_path, text)?;
        }
        if let Err(e) = write_replace(&self.journal_path, &journal_text) {
            if let Some(original) = &original_tasks {
                warn!(path = %self.tasks_path.display(), "Journal write failed; restoring task document");
                if let Err(restore) = write_replace(&self.tasks_path, original) {
                    warn!(error = %restore, "Failed to restore task document");
                }
            }
            return Err(e);
        }

        info!(
            session_id = %draft.session_id,
            tasks_done = marked.len(),
            "Journal entry written"
        );
        Ok(WriteSummary {
            session_id: draft.session_id.clone(),
            tasks_marked_done: marked,
            journal_path: self.journal_path.clone(),
            tasks_path: self.tasks_path.clone(),
        })
    }
}

/// Advisory lock held for the whole read-modify-write
struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn acquire(document: &Path) -> Result<Self> {
        let mut lock_path = document.to_path_buf();
        lock_path.set_extension("lock");
        debug!(?lock_path, "StoreLock::acquire: called");
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .context(format!("Failed to open lock file {}", lock_path.display()))?;
        file.lock_exclusive()
            .context(format!("Failed to lock {}", lock_path.display()))?;
        Ok(Self { _file: file })
    }
}

/// Read a YAML list document as raw values; a missing file is an empty list
fn read_list(path: &Path) -> Result<Vec<Value>> {
    debug!(?path, "read_list: called");
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    parse_list(path, &content)
}

fn parse_list(path: &Path, content: &str) -> Result<Vec<Value>> {
    match serde_yaml::from_str::<Value>(content).context(format!("Failed to parse {}", path.display()))? {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => Ok(items),
        _ => bail!("{} is not a list of records", path.display()),
    }
}

fn text(s: &str) -> Value {
    Value::String(s.to_string())
}

fn text_list(items: &[String]) -> Value {
    Value::Sequence(items.iter().map(|s| text(s)).collect())
}

/// Record id as text; unquoted numeric ids count too
fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn journal_entry(draft: &JournalDraft) -> Value {
    let mut entry = Mapping::new();
    entry.insert(text("id"), text(&draft.session_id));
    entry.insert(text("type"), text("journal"));
    entry.insert(text("date"), text(&draft.date));
    if let Some(number) = draft.session_id.get(1..).and_then(|n| n.parse::<u64>().ok()) {
        entry.insert(text("session"), Value::Number(number.into()));
    }
    entry.insert(text("author"), text(AUTHOR));
    entry.insert(text("test_floor"), Value::Number(draft.test_floor.into()));
    entry.insert(text("summary"), text(&draft.summary));
    entry.insert(text("committed"), text_list(&draft.committed));
    entry.insert(text("tasks_completed"), text_list(&draft.tasks_completed));
    entry.insert(text("tasks_added"), text_list(&draft.tasks_added));
    Value::Mapping(entry)
}

/// Flip completed tasks to DONE with provenance; other fields are left alone
fn mark_done(tasks: &mut [Value], draft: &JournalDraft) -> Vec<String> {
    let mut marked = Vec::new();
    for task in tasks.iter_mut() {
        let Some(id) = record_id(task) else {
            continue;
        };
        let Value::Mapping(map) = task else {
            continue;
        };
        if !draft.tasks_completed.contains(&id) {
            continue;
        }
        map.insert(text("status"), text(DONE));
        map.insert(text("modified_by"), text(AUTHOR));
        map.insert(text("modified_session"), text(&draft.session_id));
        map.insert(text("modified"), text(&draft.date));
        marked.push(id);
    }
    marked
}

/// Replace a file by writing a sibling temp file and renaming it over the original
fn write_replace(path: &Path, content: &str) -> Result<()> {
    debug!(?path, "write_replace: called");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", name));
    fs::write(&tmp, content).context(format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).context(format!("Failed to replace {}", path.display()))?;
    Ok(())
}
