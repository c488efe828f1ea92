//! Git and test-count probes run at session end

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::ProbesConfig;

/// Returned when git cannot describe the last commit
pub const GIT_UNAVAILABLE: &str = "git diff unavailable";

/// What the journalist learns about the session from outside the corpus
#[async_trait]
pub trait SessionProbes: Send + Sync {
    /// Last commit line plus changed-file stats; `GIT_UNAVAILABLE` on failure
    async fn git_summary(&self) -> String;

    /// Number of tests the suite enumerates, without running them
    async fn test_count(&self) -> Option<u32>;
}

/// Probes that shell out to git and the configured test-list command
pub struct CommandProbes {
    root: PathBuf,
    config: ProbesConfig,
}

impl CommandProbes {
    pub fn new(root: impl Into<PathBuf>, config: ProbesConfig) -> Self {
        let root = root.into();
        debug!(?root, "CommandProbes::new: called");
        Self { root, config }
    }

    /// Run a program in the project root, returning stdout on success
    async fn run(&self, program: &str, args: &[String]) -> Option<String> {
        debug!(%program, ?args, "CommandProbes::run: called");
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let output = match tokio::time::timeout(
            timeout,
            tokio::process::Command::new(program)
                .args(args)
                .current_dir(&self.root)
                .kill_on_drop(true)
                .output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(%program, error = %e, "Probe failed to start");
                return None;
            }
            Err(_) => {
                warn!(%program, ?timeout, "Probe timed out");
                return None;
            }
        };

        if !output.status.success() {
            debug!(%program, code = ?output.status.code(), "CommandProbes::run: non-zero exit");
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SessionProbes for CommandProbes {
    async fn git_summary(&self) -> String {
        debug!("CommandProbes::git_summary: called");
        let commit = self
            .run("git", &["log".into(), "-1".into(), "--pretty=%H|%s".into()])
            .await;
        let Some(commit) = commit else {
            return GIT_UNAVAILABLE.to_string();
        };
        let stat = self
            .run("git", &["diff".into(), "HEAD~1".into(), "--stat".into()])
            .await
            .unwrap_or_default();

        format!("LAST COMMIT:\n{}\n\nCHANGED FILES:\n{}", commit.trim(), stat.trim())
    }

    async fn test_count(&self) -> Option<u32> {
        debug!("CommandProbes::test_count: called");
        let (program, args) = self.config.test_list_command.split_first()?;
        let listing = self.run(program, args).await?;
        count_tests(&listing, &self.config.test_line_pattern)
    }
}

/// Count listing lines matching the per-test pattern
pub fn count_tests(listing: &str, pattern: &str) -> Option<u32> {
    let re = match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => {
            warn!(%pattern, error = %e, "Invalid test line pattern");
            return None;
        }
    };
    let count = listing.lines().filter(|l| re.is_match(l.trim_end())).count();
    u32::try_from(count).ok()
}

/// Short commit hash from a git summary, for drafts written without a model
///
/// Looks for the first line whose text before a `|` starts with seven
/// lowercase hex characters.
pub fn committed_from_diff(diff: &str) -> Vec<String> {
    for line in diff.lines() {
        let Some((head, _)) = line.split_once('|') else {
            continue;
        };
        let candidate = head.trim();
        if candidate.len() >= 7
            && candidate
                .chars()
                .take(7)
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return vec![candidate[..7].to_string()];
        }
    }
    Vec::new()
}

/// Truncate to at most `max` characters
pub fn clip(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
