//! Codebase context for the directive writer

use std::path::PathBuf;

use contextslice::{ContextSliceBuilder, SliceOptions};
use eyre::Result;
use tracing::debug;

/// Turns an intent into a prompt section describing relevant code
pub trait ContextSource: Send + Sync {
    fn build(&self, intent: &str) -> Result<String>;
}

/// Context built by searching the project tree for the intent's keywords
pub struct CodebaseContext {
    root: PathBuf,
    options: SliceOptions,
}

impl CodebaseContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(?root, "CodebaseContext::new: called");
        Self {
            root,
            options: SliceOptions {
                // Session artifacts and planning docs would otherwise outrank code
                exclude: vec!["docs/**".to_string()],
                ..SliceOptions::default()
            },
        }
    }
}

impl ContextSource for CodebaseContext {
    fn build(&self, intent: &str) -> Result<String> {
        debug!(%intent, "CodebaseContext::build: called");
        let slice = ContextSliceBuilder::new(&self.root)
            .with_options(self.options.clone())
            .build(intent)?;
        Ok(slice.to_prompt_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_codebase_context_finds_file() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("src/loot")).unwrap();
        std::fs::write(temp.path().join("src/loot/item.rs"), "pub struct ItemDrop;\n").unwrap();

        let text = CodebaseContext::new(temp.path()).build("ItemDrop loot").unwrap();
        assert!(text.contains("src/loot/item.rs"));
    }

    #[test]
    fn test_codebase_context_missing_root_errors() {
        let temp = TempDir::new().unwrap();
        let ctx = CodebaseContext::new(temp.path().join("absent"));
        assert!(ctx.build("anything here").is_err());
    }
}
