//! Whole-file replacement helpers.
//!
//! Session files, cache entries, configuration and tool writes all go
//! through a sibling temp file plus `rename`, so a reader never observes a
//! half-written file.

use std::io;
use std::path::{Path, PathBuf};

/// Sibling temp path: `dir/.name.tmp`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Atomically replace `path` with `contents`, creating parent directories.
/// An existing target keeps its permissions; on failure the temp file is
/// removed.
pub fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let written = std::fs::write(&tmp, contents)
        .and_then(|()| match std::fs::metadata(path) {
            Ok(meta) => std::fs::set_permissions(&tmp, meta.permissions()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        })
        .and_then(|()| std::fs::rename(&tmp, path));
    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

/// Async variant of [`write_atomic`].
pub async fn write_atomic_async(path: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    let written = replace_via(&tmp, path, contents.as_ref()).await;
    if written.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    written
}

async fn replace_via(tmp: &Path, path: &Path, contents: &[u8]) -> io::Result<()> {
    tokio::fs::write(tmp, contents).await?;
    match tokio::fs::metadata(path).await {
        Ok(meta) => tokio::fs::set_permissions(tmp, meta.permissions()).await?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::rename(tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/file.txt");
        write_atomic(&path, "first").unwrap();
        write_atomic(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("nested/dir/.file.txt.tmp").exists());
    }

    #[tokio::test]
    async fn async_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b.txt");
        write_atomic_async(&path, b"bytes").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn failed_replace_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let target = dir.path().join("taken");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("inner.txt"), "x").unwrap();

        assert!(write_atomic(&target, "data").is_err());
        assert!(write_atomic_async(&target, "data").await.is_err());
        assert!(!dir.path().join(".taken.tmp").exists());
        assert!(target.join("inner.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn replace_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.sh");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o750)).unwrap();

        write_atomic(&path, "#!/bin/sh\necho one\n").unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o750);
        write_atomic_async(&path, "#!/bin/sh\necho two\n").await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o750);
    }
}
