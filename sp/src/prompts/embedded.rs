//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Analyst system prompt
pub const ANALYST: &str = include_str!("../../prompts/analyst.pmt");

/// Planner system prompt
pub const PLANNER: &str = include_str!("../../prompts/planner.pmt");

/// Directive-writer system prompt
pub const DIRECTIVE: &str = include_str!("../../prompts/directive.pmt");

/// Journalist system prompt
pub const JOURNALIST: &str = include_str!("../../prompts/journalist.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "analyst" => Some(ANALYST),
        "planner" => Some(PLANNER),
        "directive" => Some(DIRECTIVE),
        "journalist" => Some(JOURNALIST),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
