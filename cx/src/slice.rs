//! Core ContextSlice implementation

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use grep_matcher::Matcher;
use grep_regex::RegexMatcherBuilder;
use grep_searcher::sinks::UTF8;
use grep_searcher::{BinaryDetection, SearcherBuilder};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Words that carry no signal about which files matter
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "into", "that", "this", "add", "new", "fix", "pass", "work", "session",
    "update", "create", "make", "use", "via", "all",
];

/// Directory names never descended into
const SKIP_DIRS: &[&str] = &["target", "node_modules", "vendor", "__pycache__", "dist", "build"];

/// Weight of a keyword appearing in the file path relative to a content hit
const PATH_HIT_WEIGHT: usize = 3;

/// Options controlling slice size and file selection
#[derive(Debug, Clone)]
pub struct SliceOptions {
    /// Maximum number of files in the slice
    pub max_files: usize,
    /// Maximum matching lines kept per file
    pub max_lines_per_file: usize,
    /// Files larger than this are skipped
    pub max_file_bytes: u64,
    /// Glob patterns (relative to root) excluded from the walk
    pub exclude: Vec<String>,
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            max_files: crate::DEFAULT_MAX_FILES,
            max_lines_per_file: crate::DEFAULT_MAX_LINES_PER_FILE,
            max_file_bytes: crate::DEFAULT_MAX_FILE_BYTES,
            exclude: Vec::new(),
        }
    }
}

/// A file judged relevant to the intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHit {
    /// Path relative to the builder root, `/`-separated
    pub path: String,
    /// Relevance score (content hits + weighted path hits)
    pub score: usize,
    /// Matching lines as (line number, trimmed text)
    pub lines: Vec<(u64, String)>,
}

/// The relevant slice of a codebase for one intent
#[derive(Debug, Clone, Default)]
pub struct ContextSlice {
    /// Intent the slice was built for
    pub intent: String,
    /// Keywords derived from the intent
    pub keywords: Vec<String>,
    /// Files ordered by descending relevance
    pub files: Vec<FileHit>,
}

impl ContextSlice {
    /// True when no file matched
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Render the slice as a compact prompt section
    pub fn to_prompt_text(&self) -> String {
        if self.files.is_empty() {
            return format!("RELEVANT FILES: none found for \"{}\"", self.intent);
        }

        let mut out = format!("RELEVANT FILES for \"{}\":\n", self.intent);
        for hit in &self.files {
            out.push_str(&format!("- {}\n", hit.path));
            for (line_num, line) in &hit.lines {
                out.push_str(&format!("    {}: {}\n", line_num, line));
            }
        }
        out
    }
}

/// Builds keyword-ranked context slices over a project tree
pub struct ContextSliceBuilder {
    root: PathBuf,
    options: SliceOptions,
}

impl ContextSliceBuilder {
    /// Create a builder rooted at the given directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        debug!(?root, "ContextSliceBuilder::new: called");
        Self {
            root,
            options: SliceOptions::default(),
        }
    }

    /// Replace the default options
    pub fn with_options(mut self, options: SliceOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the slice for an intent
    ///
    /// An intent without usable keywords yields an empty slice rather than an error.
    pub fn build(&self, intent: &str) -> Result<ContextSlice> {
        debug!(%intent, root = ?self.root, "build: called");
        if !self.root.is_dir() {
            return Err(eyre::eyre!("Context root is not a directory: {}", self.root.display()));
        }

        let keywords = intent_keywords(intent);
        if keywords.is_empty() {
            debug!("build: no keywords, returning empty slice");
            return Ok(ContextSlice {
                intent: intent.to_string(),
                keywords,
                files: Vec::new(),
            });
        }

        let pattern = keywords.join("|");
        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(true)
            .build(&pattern)
            .context(format!("Invalid keyword pattern: {}", pattern))?;

        let excludes: Vec<glob::Pattern> = self
            .options
            .exclude
            .iter()
            .map(|p| glob::Pattern::new(p).context(format!("Invalid exclude pattern: {}", p)))
            .collect::<Result<_>>()?;

        let mut searcher_builder = SearcherBuilder::new();
        searcher_builder.binary_detection(BinaryDetection::quit(b'\x00'));

        let mut hits = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file());

        for entry in walker {
            let rel = relative_path(&self.root, entry.path());
            if excludes.iter().any(|p| p.matches(&rel)) {
                continue;
            }
            let too_big = entry
                .metadata()
                .map(|m| m.len() > self.options.max_file_bytes)
                .unwrap_or(true);
            if too_big {
                debug!(%rel, "build: skipping large or unreadable file");
                continue;
            }

            let rel_lower = rel.to_lowercase();
            let path_hits = keywords.iter().filter(|k| rel_lower.contains(k.as_str())).count();

            let mut content_hits = 0usize;
            let mut lines = Vec::new();
            let max_lines = self.options.max_lines_per_file;
            let mut searcher = searcher_builder.build();
            let result = searcher.search_path(
                &matcher,
                entry.path(),
                UTF8(|line_num, line| {
                    if matcher.is_match(line.as_bytes()).unwrap_or(false) {
                        content_hits += 1;
                        if lines.len() < max_lines {
                            lines.push((line_num, line.trim().to_string()));
                        }
                    }
                    Ok(true)
                }),
            );
            if let Err(e) = result {
                debug!(%rel, %e, "build: skipping unsearchable file");
                continue;
            }

            let score = content_hits + path_hits * PATH_HIT_WEIGHT;
            if score > 0 {
                hits.push(FileHit { path: rel, score, lines });
            }
        }

        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
        hits.truncate(self.options.max_files);

        info!(%intent, file_count = hits.len(), "Context slice built");
        Ok(ContextSlice {
            intent: intent.to_string(),
            keywords,
            files: hits,
        })
    }
}

/// Split an intent into lowercase search keywords
///
/// Keeps alphanumeric/underscore words of three or more characters, drops stop
/// words and duplicates, preserves first-seen order.
pub fn intent_keywords(intent: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    intent
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= 3)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref())
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
