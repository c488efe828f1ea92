//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// SessionPilot - analyse, plan, direct and journal a work session
#[derive(Parser)]
#[command(
    name = "sp",
    about = "Resilient developer-session pipeline backed by a local model",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Project root holding the planning documents
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start or end a work session
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Write a directive from a saved session plan
    Directive {
        /// Session plan as JSON (see `session start --export-plan`)
        #[arg(short, long, value_name = "FILE")]
        plan: PathBuf,
    },

    /// Show the latest journal entry, active tasks and corpus hash
    Handoff,

    /// Inspect the planning corpus
    Corpus {
        #[command(subcommand)]
        command: CorpusCommand,
    },

    /// Show which model the ladder resolves to
    Models,

    /// Send one prompt to the remote model, after approval
    Escalate {
        /// Label of the work the call is for, recorded in the ledger
        #[arg(short, long)]
        task: String,

        /// Why the local model is not enough
        #[arg(long)]
        reason: String,

        /// Prompt to send
        prompt: String,
    },
}

/// Session subcommands
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Run the analyst and planner
    Start {
        /// Also write the session plan as JSON to this file
        #[arg(long, value_name = "FILE")]
        export_plan: Option<PathBuf>,

        /// Write the directive for the recommended option as well
        #[arg(long)]
        directive: bool,
    },

    /// Draft the journal entry and write it after approval
    End,
}

/// Corpus subcommands
#[derive(Debug, Subcommand)]
pub enum CorpusCommand {
    /// Run the deterministic rule check
    Validate,

    /// Print the corpus hash
    Hash,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sessionpilot")
        .join("logs")
        .join("sessionpilot.log");
    debug!(?path, "get_log_path: returning path");
    path
}
