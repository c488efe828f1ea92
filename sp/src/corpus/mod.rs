//! Project corpus: typed planning state, its hash, and the deterministic rules
//!
//! The corpus is rebuilt from the YAML planning documents on every run and is
//! the only input the stages share that does not depend on a model.

mod builder;
mod model;
mod validator;

pub use builder::{CorpusBuilder, JOURNAL_FILE, TASKS_FILE, canonical_json, hash_corpus, short_hash};
pub use model::{Corpus, JournalEntry, Record, Status, next_session_id};
pub use validator::{Rule, ValidationReport, Violation, validate};
