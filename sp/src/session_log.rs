//! Dated markdown artifacts, one per stage run
//!
//! Files are named `<YYYYMMDD_HHMMSS>_<stage>_<id8>.md` and never rewritten.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use eyre::{Context, Result};
use tracing::{debug, info};
use uuid::Uuid;

/// Header fields shared by every artifact
#[derive(Debug, Clone)]
pub struct ArtifactMeta<'a> {
    /// Stage name used in the file name, e.g. `analyst`
    pub stage: &'a str,
    pub title: &'a str,
    pub model: &'a str,
    /// Set when the artifact came from the fallback path
    pub degraded: Option<&'a str>,
}

/// Writes stage artifacts into the session-logs directory
#[derive(Debug, Clone)]
pub struct SessionLog {
    dir: PathBuf,
}

impl SessionLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(?dir, "SessionLog::new: called");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Unique file name for a new artifact
    pub fn file_name(stage: &str) -> String {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let id = Uuid::now_v7().simple().to_string();
        // Tail of a v7 uuid is random; the head is the timestamp
        let short = &id[id.len() - 8..];
        format!("{}_{}_{}.md", stamp, stage, short)
    }

    /// Write one artifact and return its path
    pub fn persist(&self, meta: &ArtifactMeta<'_>, body: &str) -> Result<PathBuf> {
        debug!(stage = %meta.stage, title = %meta.title, degraded = meta.degraded.is_some(), "SessionLog::persist: called");
        fs::create_dir_all(&self.dir).context(format!("Failed to create {}", self.dir.display()))?;

        let path = self.dir.join(Self::file_name(meta.stage));
        let mut doc = format!(
            "# {}: {}\n\n**Generated:** {}  \n**Model:** {}\n\n",
            capitalize(meta.stage),
            meta.title,
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            meta.model
        );
        if let Some(reason) = meta.degraded {
            doc.push_str(&format!("> **Degraded:** {}\n\n", reason));
        }
        doc.push_str(body);

        fs::write(&path, doc).context(format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Session artifact saved");
        Ok(path)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
