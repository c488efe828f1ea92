//! CLI argument parsing for contextslice

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cx")]
#[command(author, version, about = "Keyword-ranked codebase context slices", long_about = None)]
pub struct Cli {
    /// Project root to search
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a context slice for an intent
    Slice {
        /// Free-text intent, e.g. "Loot System Drop Tables"
        #[arg(required = true)]
        intent: String,

        /// Maximum files to include
        #[arg(short = 'n', long)]
        max_files: Option<usize>,

        /// Maximum matching lines per file
        #[arg(short = 'l', long)]
        max_lines: Option<usize>,

        /// Glob patterns to exclude (repeatable)
        #[arg(short, long)]
        exclude: Vec<String>,
    },

    /// Show the keywords an intent reduces to
    Keywords {
        /// Free-text intent
        #[arg(required = true)]
        intent: String,
    },
}
