//! On-disk response cache.
//!
//! Completions are stored one file per request under a cache directory
//! (normally `~/.grok/cache/`), keyed by the SHA-256 of the canonical JSON
//! of `{messages, model, temperature}`. Entries expire after 30 days and the
//! directory is kept under 500 MiB, oldest files first. Unreadable entries
//! are deleted and reported as misses.

use crate::persist::write_atomic;
use crate::{ChatCompletion, ChatRequest, Message};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Entries older than this are discarded.
pub const MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Total size the cache directory is pruned down to.
pub const MAX_TOTAL_BYTES: u64 = 500 * 1024 * 1024;

/// One cache file.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    cached_at: String,
    messages: Vec<Message>,
    model: String,
    temperature: f64,
    response: ChatCompletion,
}

/// Summary of the cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub file_count: usize,
    pub total_size_mb: f64,
    pub oldest_age_days: f64,
}

/// File-backed cache of chat completions.
#[derive(Debug)]
pub struct ResponseCache {
    dir: PathBuf,
    max_age: Duration,
    max_total_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Cache rooted at `dir`. The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: MAX_AGE,
            max_total_bytes: MAX_TOTAL_BYTES,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Override the expiry and size limits.
    pub fn with_limits(mut self, max_age: Duration, max_total_bytes: u64) -> Self {
        self.max_age = max_age;
        self.max_total_bytes = max_total_bytes;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached completion for a request, if fresh.
    pub fn get(&self, request: &ChatRequest) -> Option<ChatCompletion> {
        let key = cache_key(&request.messages, &request.model, request.temperature);
        let found = self.read_entry(&key);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit: {key}");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    fn read_entry(&self, key: &str) -> Option<ChatCompletion> {
        let path = self.entry_path(key);
        let text = std::fs::read_to_string(&path).ok()?;

        let entry = match serde_json::from_str::<CacheEntry>(&text) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Discarding unreadable cache entry {}: {e}", path.display());
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };

        let fresh = DateTime::parse_from_rfc3339(&entry.cached_at)
            .ok()
            .and_then(|at| (Local::now().fixed_offset() - at).to_std().ok())
            .is_some_and(|age| age <= self.max_age);
        if !fresh {
            debug!("Discarding expired cache entry {}", path.display());
            let _ = std::fs::remove_file(&path);
            return None;
        }
        Some(entry.response)
    }

    /// Store a completion, then prune. Pruning failures are only logged.
    pub fn put(&self, request: &ChatRequest, response: &ChatCompletion) -> Result<(), String> {
        let key = cache_key(&request.messages, &request.model, request.temperature);
        let entry = CacheEntry {
            cached_at: Local::now().to_rfc3339(),
            messages: request.messages.clone(),
            model: request.model.clone(),
            temperature: normalize_temperature(request.temperature),
            response: response.clone(),
        };
        let json = serde_json::to_string_pretty(&entry)
            .map_err(|e| format!("Failed to serialize cache entry: {e}"))?;
        write_atomic(&self.entry_path(&key), json)
            .map_err(|e| format!("Failed to write cache entry: {e}"))?;

        if let Err(e) = self.prune() {
            warn!("Cache pruning failed: {e}");
        }
        Ok(())
    }

    /// Delete expired entries, then the oldest entries while the directory
    /// is over the size limit. Returns the number of files removed.
    pub fn prune(&self) -> std::io::Result<usize> {
        let mut files = self.entries()?;
        files.sort_by_key(|(_, _, mtime)| *mtime);

        let cutoff = SystemTime::now()
            .checked_sub(self.max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut total: u64 = files.iter().map(|(_, size, _)| size).sum();
        let mut removed = 0;

        let mut kept = Vec::with_capacity(files.len());
        for (path, size, mtime) in files {
            if mtime < cutoff && std::fs::remove_file(&path).is_ok() {
                total = total.saturating_sub(size);
                removed += 1;
            } else {
                kept.push((path, size));
            }
        }

        for (path, size) in kept {
            if total <= self.max_total_bytes {
                break;
            }
            if std::fs::remove_file(&path).is_ok() {
                total = total.saturating_sub(size);
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Pruned {removed} cache entries");
        }
        Ok(removed)
    }

    /// Delete every entry. Returns the number of files deleted.
    pub fn clear(&self) -> usize {
        self.entries()
            .unwrap_or_default()
            .into_iter()
            .filter(|(path, _, _)| std::fs::remove_file(path).is_ok())
            .count()
    }

    pub fn stats(&self) -> CacheStats {
        let files = self.entries().unwrap_or_default();
        let Some(oldest) = files.iter().map(|(_, _, mtime)| *mtime).min() else {
            return CacheStats::default();
        };
        let total: u64 = files.iter().map(|(_, size, _)| size).sum();
        let age = SystemTime::now()
            .duration_since(oldest)
            .unwrap_or_default();
        CacheStats {
            file_count: files.len(),
            total_size_mb: total as f64 / (1024.0 * 1024.0),
            oldest_age_days: age.as_secs_f64() / 86_400.0,
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit rate over this process's lookups (0.0 when none were made).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// `(path, size, mtime)` of every `*.json` entry.
    fn entries(&self) -> std::io::Result<Vec<(PathBuf, u64, SystemTime)>> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut files = Vec::new();
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((path, meta.len(), mtime));
        }
        Ok(files)
    }
}

/// Temperature as stored in keys and entries: `0.7f32` becomes `0.7`, not
/// `0.699999988079071`.
fn normalize_temperature(temperature: f32) -> f64 {
    (f64::from(temperature) * 1000.0).round() / 1000.0
}

/// Lowercase hex SHA-256 of the canonical request triple.
pub fn cache_key(messages: &[Message], model: &str, temperature: f32) -> String {
    let value = serde_json::json!({
        "messages": messages,
        "model": model,
        "temperature": normalize_temperature(temperature),
    });
    // serde_json's default map keeps keys sorted.
    let canonical = serde_json::to_vec(&value).unwrap_or_default();
    format!("{:x}", Sha256::digest(&canonical))
}
