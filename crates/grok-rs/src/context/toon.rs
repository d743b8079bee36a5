//! Compact notation for session records.
//!
//! A line-oriented `key: value` encoding that costs far fewer tokens than
//! JSON when a saved session is fed back to the model. Keys are emitted in
//! ascending order, list values are joined with `,` (no spaces), and long or
//! multi-line values continue on lines indented by exactly two spaces.
//! Nothing is ever quoted or escaped.
//!
//! ```text
//! cwd: /home/user/project
//! decisions: Poetry,TOON,sandbox
//! turn_003_assistant: Here is the plan:
//!   1. parse the config
//!   2. write the tests
//! ```
//!
//! Decoding is lenient and has no error type: blank lines and `#` comments
//! are dropped, and a line without a colon is skipped. Any decoded value that
//! contains a comma and no newline becomes a list, so a scalar such as
//! `"yes, and also"` comes back as `["yes", "and also"]`. Persisted sessions
//! depend on that rule, so it is kept as-is.

use std::collections::BTreeMap;
use std::fmt;

/// Values longer than this many characters wrap onto continuation lines.
pub const MAX_LINE_CHARS: usize = 120;

/// Prefix marking a continuation line.
const CONTINUATION: &str = "  ";

/// A flat session record. `BTreeMap` keeps keys in lexicographic order so
/// encoding is deterministic regardless of insertion order.
pub type Record = BTreeMap<String, Value>;

/// A single record value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
    /// Explicitly absent. Omitted from the encoded output.
    Absent,
}

impl Value {
    /// The scalar text, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// The list items, if this is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    /// The text this value occupies on the wire (lists comma-joined).
    /// `None` for [`Value::Absent`].
    pub fn encoded_text(&self) -> Option<String> {
        match self {
            Value::Scalar(s) => Some(s.clone()),
            Value::List(items) => Some(items.join(",")),
            Value::Absent => None,
        }
    }
}

impl fmt::Display for Value {
    /// Human-readable form: lists are joined with `", "`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{s}"),
            Value::List(items) => write!(f, "{}", items.join(", ")),
            Value::Absent => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(s)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Value::List(items.into_iter().map(str::to_string).collect())
    }
}

// ── Encoding ───────────────────────────────────────────────────────

/// Encode a record. Always ends with a trailing newline.
pub fn encode(record: &Record) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(record.len());

    for (key, value) in record {
        let Some(text) = value.encoded_text() else {
            continue;
        };

        if text.contains('\n') || text.chars().count() > MAX_LINE_CHARS {
            let segments = if text.contains('\n') {
                text.split('\n').map(str::to_string).collect()
            } else {
                chunk_chars(&text, MAX_LINE_CHARS)
            };
            let mut segments = segments.into_iter();
            let first = segments.next().unwrap_or_default();
            lines.push(format!("{key}: {first}"));
            lines.extend(segments.map(|s| format!("{CONTINUATION}{s}")));
        } else {
            lines.push(format!("{key}: {text}"));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Split `text` into pieces of at most `size` characters.
fn chunk_chars(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

// ── Decoding ───────────────────────────────────────────────────────

/// Decode compact notation into a record. Never fails.
pub fn decode(text: &str) -> Record {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| {
            let t = line.trim();
            !t.is_empty() && !t.starts_with('#')
        })
        .collect();

    let mut record = Record::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        i += 1;

        let Some((key, first)) = line.split_once(':') else {
            continue;
        };
        let mut value = first.trim().to_string();

        while let Some(next) = lines.get(i) {
            let continuation = if let Some(rest) = next.strip_prefix(CONTINUATION) {
                rest
            } else if let Some(rest) = next.strip_prefix('\t') {
                rest
            } else {
                break;
            };
            value.push('\n');
            value.push_str(continuation);
            i += 1;
        }

        record.insert(key.trim().to_string(), classify(value));
    }
    record
}

/// Apply the list rule: a comma and no newline means list.
fn classify(value: String) -> Value {
    if value.contains(',') && !value.contains('\n') {
        Value::List(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    } else {
        Value::Scalar(value)
    }
}

// ── Token estimate ─────────────────────────────────────────────────

/// Cheap token estimate used for compression thresholds:
/// whitespace-delimited words plus characters / 4.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count() + text.chars().count() / 4
}
