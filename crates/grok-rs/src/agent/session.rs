//! Saved sessions and the in-memory conversation.
//!
//! A session is a flat [`Record`] written in compact notation to
//! `<project>/.grok/sessions/<timestamp>.toon`. A `current` entry in the same
//! directory (a symlink on unix, a one-line pointer file elsewhere) names the
//! active session. Records are compressed before every save.
//!
//! ```text
//! .grok/sessions/
//!   2026-10-17T09:12:44.toon
//!   2026-10-17T10:03:10.toon
//!   current -> 2026-10-17T10:03:10.toon
//! ```

use super::events::HarnessResult;
use crate::context::compressor::{self, CompressionError, CompressionMode};
use crate::context::toon::{self, Record, Value};
use crate::persist::write_atomic;
use crate::{Message, MessageRole};
use chrono::Local;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the pointer to the active session.
pub const CURRENT_POINTER: &str = "current";

/// Session file extension.
pub const SESSION_EXTENSION: &str = "toon";

/// Directory names never descended into by [`compute_files_hash`].
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    "node_modules",
    ".idea",
    ".vscode",
    "build",
    "dist",
    "target",
];

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No current session found. Start a new session.")]
    NoCurrentSession,
    #[error("Session file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error(transparent)]
    Compression(#[from] CompressionError),
    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

// ── SessionStore ───────────────────────────────────────────────────

/// Session files for one project.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Store under `<project_dir>/sessions/`. `project_dir` is normally
    /// `<launch>/.grok`.
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: project_dir.as_ref().join("sessions"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Compress, encode and write `record`, then point `current` at it.
    pub fn save(&self, record: Record, mode: CompressionMode) -> Result<PathBuf, SessionError> {
        let compressed = compressor::compress(record, mode)?;
        let text = toon::encode(&compressed);

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| SessionError::io("create", &self.dir, e))?;
        let path = self.next_session_path();
        write_atomic(&path, &text).map_err(|e| SessionError::io("write", &path, e))?;
        self.set_current(&path)?;

        info!(
            "Saved session {} ({} keys, ~{} tokens)",
            path.display(),
            compressed.len(),
            toon::estimate_tokens(&text)
        );
        Ok(path)
    }

    /// Load the session at `path`, or the current one when `None`.
    pub fn load(&self, path: Option<&Path>) -> Result<Record, SessionError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.current().ok_or(SessionError::NoCurrentSession)?,
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SessionError::NotFound(path));
            }
            Err(e) => return Err(SessionError::io("read", &path, e)),
        };
        debug!("Loaded session {}", path.display());
        Ok(toon::decode(&text))
    }

    /// Path of the current session, if the pointer exists and its target
    /// is still there.
    pub fn current(&self) -> Option<PathBuf> {
        let pointer = self.dir.join(CURRENT_POINTER);
        let name = match std::fs::read_link(&pointer) {
            Ok(target) => target,
            Err(_) => PathBuf::from(std::fs::read_to_string(&pointer).ok()?.trim()),
        };
        let path = self.dir.join(name);
        path.is_file().then_some(path)
    }

    /// Session files, newest first by modification time.
    pub fn list(&self) -> Result<Vec<PathBuf>, SessionError> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionError::io("list", &self.dir, e)),
        };
        let mut sessions: Vec<(std::time::SystemTime, PathBuf)> = read_dir
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == SESSION_EXTENSION))
            .filter_map(|p| {
                let mtime = std::fs::metadata(&p).and_then(|m| m.modified()).ok()?;
                Some((mtime, p))
            })
            .collect();
        sessions.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(sessions.into_iter().map(|(_, p)| p).collect())
    }

    /// Forget the current session (the files stay).
    pub fn clear_current(&self) -> Result<(), SessionError> {
        let pointer = self.dir.join(CURRENT_POINTER);
        match std::fs::remove_file(&pointer) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::io("remove", &pointer, e)),
        }
    }

    /// `<timestamp>.toon`, with `-N` appended when saved twice in a second.
    fn next_session_path(&self) -> PathBuf {
        let stamp = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let mut path = self.dir.join(format!("{stamp}.{SESSION_EXTENSION}"));
        let mut n = 2;
        while path.exists() {
            path = self.dir.join(format!("{stamp}-{n}.{SESSION_EXTENSION}"));
            n += 1;
        }
        path
    }

    fn set_current(&self, session: &Path) -> Result<(), SessionError> {
        let pointer = self.dir.join(CURRENT_POINTER);
        let name = session.file_name().map(PathBuf::from).unwrap_or_default();
        if pointer.symlink_metadata().is_ok() {
            std::fs::remove_file(&pointer).map_err(|e| SessionError::io("replace", &pointer, e))?;
        }
        #[cfg(unix)]
        let linked = std::os::unix::fs::symlink(&name, &pointer);
        #[cfg(not(unix))]
        let linked = write_atomic(&pointer, name.to_string_lossy().as_bytes());
        linked.map_err(|e| SessionError::io("update", &pointer, e))
    }
}

// ── Record conversion ──────────────────────────────────────────────

/// Turn entries for user and assistant text messages: `turn_NNN_role`.
/// System and tool messages are not part of a saved session.
pub fn messages_to_record(messages: &[Message]) -> Record {
    messages
        .iter()
        .filter(|m| matches!(m.role, MessageRole::User | MessageRole::Assistant))
        .filter(|m| m.tool_calls.is_none())
        .enumerate()
        .map(|(i, m)| (format!("turn_{i:03}_{}", m.role), Value::from(m.text())))
        .collect()
}

/// Rebuild user and assistant messages from turn entries in key order.
/// List values (the comma ambiguity) are joined with `", "`.
pub fn record_to_messages(record: &Record) -> Vec<Message> {
    record
        .iter()
        .filter(|(key, _)| key.starts_with("turn_"))
        .filter_map(|(key, value)| {
            let role = key.splitn(3, '_').nth(2)?;
            let content = value.to_string();
            match role {
                "user" => Some(Message::user(content)),
                "assistant" => Some(Message::assistant_text(content)),
                _ => None,
            }
        })
        .collect()
}

/// SHA-256 over the sorted relative paths of every file under `root`,
/// skipping hidden entries and [`IGNORED_DIRS`]. Changes when files are
/// added, removed or renamed; content edits do not change it.
pub fn compute_files_hash(root: &Path) -> String {
    let mut files = Vec::new();
    collect_files(root, root, &mut files);
    files.sort();

    let mut digest = Sha256::new();
    for rel in &files {
        let joined: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        digest.update(joined.join("/").as_bytes());
    }
    format!("{:x}", digest.finalize())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || IGNORED_DIRS.contains(&name.as_ref()) {
            continue;
        }
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let path = entry.path();
        if file_type.is_dir() {
            collect_files(root, &path, out);
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
}

// ── Conversation ───────────────────────────────────────────────────

/// Durable user/assistant history across REPL lines.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Message>,
    goal: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a saved record.
    pub fn from_record(record: &Record) -> Self {
        Self {
            turns: record_to_messages(record),
            goal: record.get("goal").map(|v| v.to_string()),
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Message::user(text));
    }

    /// Keep the final answer of a finished run. Round-limit notices are
    /// not part of the history.
    pub fn record_answer(&mut self, text: impl Into<String>, finished: bool) {
        if finished {
            self.turns.push(Message::assistant_text(text));
        }
    }

    pub fn record_result(&mut self, result: &HarnessResult) {
        self.record_answer(result.text.clone(), result.finished);
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    pub fn set_goal(&mut self, goal: impl Into<String>) {
        self.goal = Some(goal.into());
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.goal = None;
    }

    /// Session record for saving: `cwd`, `files_hash`, `goal`, the turn
    /// entries and `last_user` / `last_assistant`.
    pub fn snapshot(&self, cwd: &Path) -> Record {
        let mut record = messages_to_record(&self.turns);
        record.insert("cwd".into(), Value::from(cwd.display().to_string()));
        record.insert("files_hash".into(), Value::from(compute_files_hash(cwd)));

        let goal = self.goal.clone().or_else(|| {
            self.turns
                .iter()
                .find(|m| m.role == MessageRole::User)
                .map(|m| m.text().to_string())
        });
        if let Some(goal) = goal {
            record.insert("goal".into(), Value::from(goal));
        }

        for (key, role) in [
            ("last_user", MessageRole::User),
            ("last_assistant", MessageRole::Assistant),
        ] {
            if let Some(m) = self.turns.iter().rev().find(|m| m.role == role) {
                record.insert(key.into(), Value::from(m.text()));
            }
        }
        record
    }
}
