//! Human approval gate
//!
//! Approval is synchronous with no timeout. A session that cannot ask (stdin
//! is not a terminal) or gets no clear "yes" is treated as a denial.

use std::io::IsTerminal;

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, warn};

/// Asks a human to confirm an action
pub trait Approver {
    /// True only on explicit approval
    fn confirm(&self, prompt: &str) -> bool;
}

/// Interactive y/N prompt on the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalApprover;

impl TerminalApprover {
    pub fn new() -> Self {
        Self
    }
}

/// Accepts `y` or `yes` in any case
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

impl Approver for TerminalApprover {
    fn confirm(&self, prompt: &str) -> bool {
        debug!(%prompt, "TerminalApprover::confirm: called");
        if !std::io::stdin().is_terminal() {
            warn!("Approval requested without an interactive terminal; denying");
            return false;
        }

        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                warn!(error = %e, "Failed to open prompt; denying");
                return false;
            }
        };

        match rl.readline(&format!("{} {} ", prompt.bold(), "[y/N]".dimmed())) {
            Ok(line) => is_affirmative(&line),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                debug!("TerminalApprover::confirm: no answer");
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to read approval; denying");
                false
            }
        }
    }
}

/// Never approves; used when running unattended
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl Approver for DenyAll {
    fn confirm(&self, prompt: &str) -> bool {
        debug!(%prompt, "DenyAll::confirm: denied");
        false
    }
}
