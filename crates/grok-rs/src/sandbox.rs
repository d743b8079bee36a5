//! Filesystem boundary for every tool call.
//!
//! A [`Sandbox`] is created once at process start with an immutable root (the
//! launch directory) and a mutable current directory that always stays at or
//! below the root. Every file tool resolves its path through
//! [`Sandbox::resolve_and_check`]; there is no other route to the disk.
//!
//! Resolution is lexical plus symlink-aware: each component is appended in
//! turn, symlinks are followed as they are met (even dangling ones), and `..`
//! pops the already-resolved prefix. Paths that do not exist yet resolve
//! normally, so writes to new files are checked exactly like reads.

use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, warn};

/// Upper bound on nested symlink expansions during one resolution.
const MAX_SYMLINK_DEPTH: usize = 40;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error(
        "Cannot {operation} path outside launch directory: {}\nLaunch directory: {}",
        .attempted.display(),
        .root.display()
    )]
    Violation {
        operation: String,
        attempted: PathBuf,
        root: PathBuf,
    },
    #[error("Directory not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("Cannot resolve {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SandboxError {
    pub fn is_violation(&self) -> bool {
        matches!(self, SandboxError::Violation { .. })
    }
}

/// Launch-directory confinement shared by all file tools.
#[derive(Debug)]
pub struct Sandbox {
    root: PathBuf,
    current: RwLock<PathBuf>,
    unrestricted: bool,
}

impl Sandbox {
    /// Confine all operations to `root`, which must be an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let root = resolve_existing_dir(root.as_ref())?;
        debug!(root = %root.display(), "Sandbox initialized");
        Ok(Self {
            current: RwLock::new(root.clone()),
            root,
            unrestricted: false,
        })
    }

    /// Allow the entire filesystem. The current directory starts at `start`.
    pub fn unrestricted(start: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let start = resolve_existing_dir(start.as_ref())?;
        let root = start
            .ancestors()
            .last()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| start.clone());
        warn!(start = %start.display(), "Sandbox disabled, entire filesystem allowed");
        Ok(Self {
            root,
            current: RwLock::new(start),
            unrestricted: true,
        })
    }

    /// The immutable sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    /// The current directory used for relative paths.
    pub fn current_dir(&self) -> PathBuf {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Resolve `path` against the current directory and reject anything that
    /// lands outside the root. `operation` names the attempted action in the
    /// error message ("read", "write", ...).
    pub fn resolve_and_check(
        &self,
        path: impl AsRef<Path>,
        operation: &str,
    ) -> Result<PathBuf, SandboxError> {
        let path = path.as_ref();
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir().join(path)
        };
        let resolved = resolve(&joined).map_err(|source| SandboxError::Io {
            path: joined.clone(),
            source,
        })?;

        if !resolved.starts_with(&self.root) {
            warn!(
                operation,
                attempted = %resolved.display(),
                root = %self.root.display(),
                "Sandbox violation"
            );
            return Err(SandboxError::Violation {
                operation: operation.to_string(),
                attempted: resolved,
                root: self.root.clone(),
            });
        }
        Ok(resolved)
    }

    /// Move the current directory. The target must be an existing directory
    /// inside the root.
    pub fn change_directory(&self, path: impl AsRef<Path>) -> Result<PathBuf, SandboxError> {
        let resolved = self.resolve_and_check(path, "cd")?;
        if !resolved.exists() {
            return Err(SandboxError::NotFound(resolved));
        }
        if !resolved.is_dir() {
            return Err(SandboxError::NotADirectory(resolved));
        }
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = resolved.clone();
        debug!(cwd = %resolved.display(), "Changed directory");
        Ok(resolved)
    }

    /// Boundary-check `path`, then decide whether it may be overwritten.
    ///
    /// Missing targets and `auto_confirm` return `true` without asking;
    /// otherwise `ask` gets the resolved path and its answer is returned.
    pub async fn confirm_overwrite<F, Fut>(
        &self,
        path: impl AsRef<Path>,
        auto_confirm: bool,
        ask: F,
    ) -> Result<bool, SandboxError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = bool>,
    {
        let resolved = self.resolve_and_check(path, "overwrite")?;
        if !resolved.exists() || auto_confirm {
            return Ok(true);
        }
        Ok(ask(resolved).await)
    }

    /// `path` relative to the root for display, or unchanged if outside.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| {
                if p.as_os_str().is_empty() {
                    ".".to_string()
                } else {
                    p.display().to_string()
                }
            })
            .unwrap_or_else(|_| path.display().to_string())
    }
}

fn resolve_existing_dir(path: &Path) -> Result<PathBuf, SandboxError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| SandboxError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .join(path)
    };
    let resolved = resolve(&absolute).map_err(|source| SandboxError::Io {
        path: absolute.clone(),
        source,
    })?;
    if !resolved.exists() {
        return Err(SandboxError::NotFound(resolved));
    }
    if !resolved.is_dir() {
        return Err(SandboxError::NotADirectory(resolved));
    }
    Ok(resolved)
}

/// Resolve an absolute path component by component, following symlinks.
fn resolve(path: &Path) -> io::Result<PathBuf> {
    resolve_with_depth(path, 0)
}

fn resolve_with_depth(path: &Path, depth: usize) -> io::Result<PathBuf> {
    if depth > MAX_SYMLINK_DEPTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "too many levels of symbolic links",
        ));
    }

    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(name) => {
                let candidate = resolved.join(name);
                match std::fs::symlink_metadata(&candidate) {
                    Ok(meta) if meta.file_type().is_symlink() => {
                        let target = std::fs::read_link(&candidate)?;
                        let absolute = if target.is_absolute() {
                            target
                        } else {
                            resolved.join(target)
                        };
                        resolved = resolve_with_depth(&absolute, depth + 1)?;
                    }
                    _ => resolved = candidate,
                }
            }
        }
    }
    Ok(resolved)
}
