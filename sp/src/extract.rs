//! Structured-output extraction
//!
//! Models wrap JSON in prose, fences, or leave it unterminated. Extraction is
//! two steps: cut a candidate object out of the raw text, then decode the first
//! complete JSON value from it and check it against the artifact's contract.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Longest raw-output excerpt carried in errors and logs
pub const EXCERPT_CHARS: usize = 300;

static FENCED: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").ok());

/// Model output did not satisfy an artifact contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("no JSON value in model output (raw: {excerpt})")]
    Empty { excerpt: String },

    #[error("malformed JSON: {reason} (raw: {excerpt})")]
    Malformed { reason: String, excerpt: String },

    #[error("wrong shape: {reason}")]
    Schema { reason: String },

    #[error("field '{field}' {reason}")]
    Invalid { field: String, reason: String },
}

impl ContractError {
    /// Contract violation on a named field
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Semantic checks beyond what deserialization enforces
pub trait Contract {
    /// Verify required content and cross-field rules
    fn check(&self) -> Result<(), ContractError>;

    /// Repair what can be repaired without guessing (ordering, trimming)
    fn normalize(&mut self) {}
}

/// First `EXCERPT_CHARS` characters of `raw`, for diagnostics
pub fn excerpt(raw: &str) -> String {
    raw.chars().take(EXCERPT_CHARS).collect()
}

/// Cut the candidate JSON object out of raw model text
///
/// 1. a fenced block (optionally tagged `json`) yields its interior;
/// 2. otherwise scan from the first `{` and stop at the brace that brings the
///    depth back to zero, ignoring braces inside string literals;
/// 3. when depth never returns to zero the tail from the first `{` is
///    returned verbatim and left for the decoder to reject.
///
/// Text without any `{` comes back trimmed.
pub fn extract_json(raw: &str) -> &str {
    debug!(raw_len = raw.len(), "extract_json: called");

    if let Some(fenced) = FENCED.as_ref().and_then(|re| re.captures(raw)).and_then(|c| c.get(1)) {
        debug!("extract_json: fenced block");
        return fenced.as_str();
    }

    let Some(start) = raw.find('{') else {
        debug!("extract_json: no opening brace");
        return raw.trim();
    };

    let tail = &raw[start..];
    match find_matching_brace(tail) {
        Some(end) => {
            debug!(end, "extract_json: balanced object");
            &tail[..end]
        }
        None => {
            debug!("extract_json: unbalanced, returning tail");
            tail
        }
    }
}

/// Byte offset just past the brace that closes the object `s` starts with
fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode the first complete JSON value in `candidate`; trailing text is ignored
pub fn first_value(candidate: &str) -> Result<Value, ContractError> {
    debug!(candidate_len = candidate.len(), "first_value: called");
    let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(ContractError::Malformed {
            reason: e.to_string(),
            excerpt: excerpt(candidate),
        }),
        None => Err(ContractError::Empty {
            excerpt: excerpt(candidate),
        }),
    }
}

/// Extract, decode and contract-check an artifact from raw model text
pub fn decode<T>(raw: &str) -> Result<T, ContractError>
where
    T: DeserializeOwned + Contract,
{
    debug!(raw_len = raw.len(), "decode: called");
    let value = first_value(extract_json(raw))?;
    if !value.is_object() {
        return Err(ContractError::Schema {
            reason: "expected a JSON object".to_string(),
        });
    }

    let mut artifact: T = serde_json::from_value(value).map_err(|e| ContractError::Schema { reason: e.to_string() })?;
    artifact.normalize();
    artifact.check()?;
    Ok(artifact)
}
