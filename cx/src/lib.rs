//! ContextSlice - keyword-ranked codebase context for prompt grounding
//!
//! Given a short intent string ("Loot System Drop Tables"), walks a project
//! tree, greps every text file for the intent's keywords and returns the most
//! relevant real file locations with a few matching lines each. The result is
//! small enough to paste into a prompt for a low-capability model.
//!
//! # Example
//!
//! ```ignore
//! use contextslice::ContextSliceBuilder;
//!
//! let slice = ContextSliceBuilder::new(".").build("combat damage numbers")?;
//! println!("{}", slice.to_prompt_text());
//! ```

pub mod cli;
mod slice;

pub use slice::{ContextSlice, ContextSliceBuilder, FileHit, SliceOptions, intent_keywords};

/// Default number of files kept in a slice
pub const DEFAULT_MAX_FILES: usize = 8;

/// Default number of matching lines kept per file
pub const DEFAULT_MAX_LINES_PER_FILE: usize = 3;

/// Files larger than this are skipped (256KB)
pub const DEFAULT_MAX_FILE_BYTES: u64 = 256 * 1024;
