//! Size-bounded compression of session records.
//!
//! A saved session grows by two turn entries per exchange. Before it is
//! persisted, [`compress`] keeps the encoded record under a token budget:
//!
//! - Structural keys (`goal`, `decisions`, `cwd`, `files_hash`, `open`),
//!   file/diff payloads and credential-like keys are copied verbatim.
//! - The newest [`PROTECTED_TURNS`] turn entries are kept at full fidelity.
//! - Older turns collapse into short one-line summaries under `history`,
//!   newest last, at most [`MAX_HISTORY_STEPS`] of them.
//!
//! If the result still exceeds [`HARD_CEILING_TOKENS`], compression fails
//! with [`CompressionError::TooLarge`] instead of dropping more data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::toon::{self, Record, Value};

/// Above this estimate, `smart` mode compresses.
pub const SOFT_TRIGGER_TOKENS: usize = 12_000;

/// A compressed record larger than this is a fatal condition.
pub const HARD_CEILING_TOKENS: usize = 20_000;

/// Number of most recent turn entries kept verbatim (three exchanges).
pub const PROTECTED_TURNS: usize = 6;

/// Maximum number of summaries kept under the `history` key.
pub const MAX_HISTORY_STEPS: usize = 15;

/// Historical turn values are cut to this many characters.
pub const SUMMARY_CHARS: usize = 50;

/// Key under which historical summaries are stored.
pub const HISTORY_KEY: &str = "history";

const STRUCTURAL_KEYS: [&str; 5] = ["goal", "decisions", "cwd", "files_hash", "open"];
const PAYLOAD_PREFIXES: [&str; 2] = ["files", "diff"];
const CREDENTIAL_MARKERS: [&str; 3] = ["api", "secret", "key"];

// ── Mode ───────────────────────────────────────────────────────────

/// When to compress a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Compress unconditionally.
    Always,
    /// Compress only when the estimate reaches [`SOFT_TRIGGER_TOKENS`].
    #[default]
    Smart,
    /// Never compress.
    Never,
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMode::Always => write!(f, "always"),
            CompressionMode::Smart => write!(f, "smart"),
            CompressionMode::Never => write!(f, "never"),
        }
    }
}

impl FromStr for CompressionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(CompressionMode::Always),
            "smart" => Ok(CompressionMode::Smart),
            "never" => Ok(CompressionMode::Never),
            other => Err(format!(
                "Invalid compression mode '{other}' (expected always, smart or never)"
            )),
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompressionError {
    #[error(
        "Context too large even after compression ({tokens} tokens > 20k limit). \
         Start a new session with 'grok resume --new' or clear history."
    )]
    TooLarge { tokens: usize, limit: usize },
}

// ── Compression ────────────────────────────────────────────────────

/// Estimated token count of a record's encoded form.
pub fn estimate_record_tokens(record: &Record) -> usize {
    toon::estimate_tokens(&toon::encode(record))
}

/// Whether `key` names a user or assistant turn entry (`turn_NNN_role`).
pub fn is_turn_key(key: &str) -> bool {
    key.starts_with("turn_") && (key.contains("_user") || key.contains("_assistant"))
}

/// Compress `record` according to `mode`.
pub fn compress(record: Record, mode: CompressionMode) -> Result<Record, CompressionError> {
    if mode == CompressionMode::Never {
        return Ok(record);
    }

    let before = estimate_record_tokens(&record);
    if mode == CompressionMode::Smart && before < SOFT_TRIGGER_TOKENS {
        debug!(tokens = before, "Session below compression trigger");
        return Ok(record);
    }

    let mut out = Record::new();

    for key in STRUCTURAL_KEYS {
        if let Some(value) = record.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }

    for (key, value) in &record {
        if PAYLOAD_PREFIXES.iter().any(|p| key.starts_with(p)) {
            out.insert(key.clone(), value.clone());
        }
    }

    for (key, value) in &record {
        let lower = key.to_lowercase();
        if matches!(value, Value::Scalar(_)) && CREDENTIAL_MARKERS.iter().any(|m| lower.contains(m))
        {
            out.insert(key.clone(), value.clone());
        }
    }

    // Record keys iterate in sorted order, which is chronological for
    // zero-padded turn indices.
    let turn_keys: Vec<&String> = record.keys().filter(|k| is_turn_key(k)).collect();
    let split = turn_keys.len().saturating_sub(PROTECTED_TURNS);
    let (historical, protected) = turn_keys.split_at(split);

    let summaries: Vec<String> = historical
        .iter()
        .filter_map(|key| record.get(key.as_str()))
        .filter_map(summarize)
        .collect();

    for key in protected {
        if let Some(value) = record.get(key.as_str()) {
            out.insert((*key).clone(), value.clone());
        }
    }

    for key in ["last_user", "last_assistant"] {
        if let Some(value) = record.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }

    if !summaries.is_empty() {
        let keep_from = summaries.len().saturating_sub(MAX_HISTORY_STEPS);
        out.insert(
            HISTORY_KEY.to_string(),
            Value::List(summaries[keep_from..].to_vec()),
        );
    }

    let after = estimate_record_tokens(&out);
    if after > HARD_CEILING_TOKENS {
        return Err(CompressionError::TooLarge {
            tokens: after,
            limit: HARD_CEILING_TOKENS,
        });
    }

    info!(
        before,
        after,
        summarized = historical.len(),
        "Compressed session record"
    );
    Ok(out)
}

/// One-line summary of a historical turn value. A turn whose text carried a
/// comma decodes as a list after a save and load; it is summarized by its
/// encoded (comma-joined) text rather than dropped.
fn summarize(value: &Value) -> Option<String> {
    let text = value.encoded_text()?;
    let summary = if text.chars().count() > SUMMARY_CHARS {
        let head: String = text.chars().take(SUMMARY_CHARS).collect();
        format!("{head}...")
    } else {
        text
    };
    Some(summary.replace('\n', " "))
}
