//! Shell-like commands in the REPL: navigation (`ls`, `ll`, `cd`, `pwd`,
//! `tree`), reading (`cat`, `head`, `tail`) and file management (`mkdir`,
//! `cp`, `mv`, `rm`).
//!
//! Every path goes through the sandbox. Listing and reading reuse the file
//! tools so output matches what the model sees; copies, moves and deletions
//! wait on the same confirmation gate as model writes.

use std::path::{Path, PathBuf};

use grok_rs::sandbox::{Sandbox, SandboxError};
use grok_rs::tools::{ConfirmAction, FileTools};
use tracing::{info, warn};

pub const SHELL_COMMANDS: [&str; 12] = [
    "ls", "ll", "cd", "pwd", "cat", "head", "tail", "mkdir", "tree", "cp", "mv", "rm",
];

/// Lines shown by `head` and `tail` without `-n`.
const DEFAULT_LINES: usize = 10;

/// Levels below the starting directory shown by `tree`.
const TREE_DEPTH: usize = 3;

pub fn is_shell_command(word: &str) -> bool {
    SHELL_COMMANDS.contains(&word)
}

/// Run a shell-like command. `Ok` carries the text to print.
pub async fn run(files: &FileTools, command: &str, args: &[String]) -> Result<String, String> {
    match command {
        "ls" | "ll" => {
            let path = args.first().map(String::as_str).unwrap_or(".");
            files.list(path).await.map_err(|e| e.message)
        }
        "cd" => cd(files.sandbox(), args.first().map(String::as_str)),
        "pwd" => Ok(pwd(files)),
        "cat" => {
            if args.is_empty() {
                return Err("cat requires at least one file argument".to_string());
            }
            let mut out = String::new();
            for path in args {
                out.push_str(&files.read(path).await.map_err(|e| e.message)?);
            }
            Ok(out)
        }
        "head" => slice_lines(files, "head", args, false).await,
        "tail" => slice_lines(files, "tail", args, true).await,
        "mkdir" => mkdir(files.sandbox(), args).await,
        "tree" => tree(files.sandbox(), args.first().map(String::as_str)).await,
        "cp" => copy(files, args).await,
        "mv" => move_entry(files, args).await,
        "rm" => remove(files, args).await,
        other => Err(format!("Unknown command: {other}")),
    }
}

/// Current directory, plus the launch directory when they differ.
pub fn pwd(files: &FileTools) -> String {
    let sandbox = files.sandbox();
    let cwd = sandbox.current_dir();
    if cwd == sandbox.root() || sandbox.is_unrestricted() {
        cwd.display().to_string()
    } else {
        format!("{}\nLaunch: {}", cwd.display(), sandbox.root().display())
    }
}

fn violation(e: SandboxError) -> String {
    match e {
        e @ SandboxError::Violation { .. } => format!("SANDBOX VIOLATION: {e}"),
        e => e.to_string(),
    }
}

/// Bare `cd` returns to the launch directory.
fn cd(sandbox: &Sandbox, target: Option<&str>) -> Result<String, String> {
    let target = target.map_or_else(|| sandbox.root().to_path_buf(), PathBuf::from);
    match sandbox.change_directory(target) {
        Ok(dir) => Ok(sandbox.display_path(&dir)),
        Err(e @ SandboxError::Violation { .. }) => {
            Err(format!("SANDBOX VIOLATION: Cannot navigate outside project\n{e}"))
        }
        Err(e) => Err(e.to_string()),
    }
}

// ── Reading ─────────────────────────────────────────────────────────

/// Split `-n NUM` from file arguments.
fn line_count_and_files(command: &str, args: &[String]) -> Result<(usize, Vec<String>), String> {
    let mut count = DEFAULT_LINES;
    let mut paths = Vec::new();
    let mut args = args.iter();
    while let Some(arg) = args.next() {
        if arg == "-n" {
            let Some(value) = args.next() else {
                return Err(format!("{command}: -n requires a number"));
            };
            count = value
                .parse()
                .map_err(|_| format!("Invalid number: {value}"))?;
        } else {
            paths.push(arg.clone());
        }
    }
    if paths.is_empty() {
        return Err(format!("{command} requires a file argument"));
    }
    Ok((count, paths))
}

/// First (or, `from_end`, last) lines of each file.
async fn slice_lines(
    files: &FileTools,
    command: &str,
    args: &[String],
    from_end: bool,
) -> Result<String, String> {
    let (count, paths) = line_count_and_files(command, args)?;
    let mut out = Vec::new();
    for path in &paths {
        let content = files.read(path).await.map_err(|e| e.message)?;
        let lines: Vec<&str> = content.lines().collect();
        let (start, end) = if from_end {
            (lines.len().saturating_sub(count), lines.len())
        } else {
            (0, count.min(lines.len()))
        };
        out.extend(lines[start..end].iter().map(|line| line.to_string()));
    }
    Ok(out.join("\n"))
}

// ── Directories ─────────────────────────────────────────────────────

async fn mkdir(sandbox: &Sandbox, args: &[String]) -> Result<String, String> {
    let parents = args.iter().any(|a| a == "-p");
    let paths: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    if paths.is_empty() {
        return Err("mkdir requires a directory path".to_string());
    }
    let mut out = Vec::new();
    for path in paths {
        let resolved = sandbox.resolve_and_check(path, "create").map_err(violation)?;
        if tokio::fs::symlink_metadata(&resolved).await.is_ok() {
            out.push(format!("Warning: {path} already exists"));
            continue;
        }
        let created = if parents {
            tokio::fs::create_dir_all(&resolved).await
        } else {
            tokio::fs::create_dir(&resolved).await
        };
        created.map_err(|e| format!("{path}: {e}"))?;
        info!("Created directory {}", resolved.display());
        out.push(format!("Created: {path}"));
    }
    Ok(out.join("\n"))
}

async fn tree(sandbox: &Sandbox, target: Option<&str>) -> Result<String, String> {
    let target = target.unwrap_or(".");
    let resolved = sandbox.resolve_and_check(target, "read").map_err(violation)?;
    if !resolved.exists() {
        return Err(format!("{target} does not exist"));
    }
    if !resolved.is_dir() {
        return Err(format!("{target} is not a directory"));
    }
    let name = resolved
        .file_name()
        .map_or_else(|| resolved.display().to_string(), |n| n.to_string_lossy().into_owned());
    tokio::task::spawn_blocking(move || {
        let mut out = format!("{name}/");
        draw_tree(&resolved, "", 0, &mut out);
        out
    })
    .await
    .map_err(|e| format!("tree failed: {e}"))
}

/// Directories first, then files, case-insensitive, dotfiles skipped.
/// Symlinks are listed as plain entries and never followed.
fn sorted_entries(dir: &Path) -> std::io::Result<Vec<(bool, String)>> {
    let mut entries: Vec<(bool, String)> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            (entry.file_type().is_ok_and(|t| t.is_dir()), name)
        })
        .filter(|(_, name)| !name.starts_with('.'))
        .collect();
    entries.sort_by_key(|(is_dir, name)| (!*is_dir, name.to_lowercase()));
    Ok(entries)
}

fn draw_tree(dir: &Path, prefix: &str, depth: usize, out: &mut String) {
    if depth >= TREE_DEPTH {
        return;
    }
    let entries = match sorted_entries(dir) {
        Ok(entries) => entries,
        Err(_) => {
            out.push_str(&format!("\n{prefix}└── (permission denied)"));
            return;
        }
    };
    let last = entries.len().saturating_sub(1);
    for (i, (is_dir, name)) in entries.iter().enumerate() {
        let (branch, indent) = if i == last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push_str(&format!("\n{prefix}{branch}{name}{}", if *is_dir { "/" } else { "" }));
        if *is_dir {
            draw_tree(&dir.join(name), &format!("{prefix}{indent}"), depth + 1, out);
        }
    }
}

// ── Copy, move, remove ──────────────────────────────────────────────

/// The entry `arg` names, without following a final symlink. The fully
/// resolved path must pass the sandbox too, so links leaving it are refused.
fn entry(sandbox: &Sandbox, arg: &str, operation: &str) -> Result<PathBuf, String> {
    let resolved = sandbox.resolve_and_check(arg, operation).map_err(violation)?;
    let path = Path::new(arg);
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        let link = sandbox
            .resolve_and_check(parent, operation)
            .map_err(violation)?
            .join(name);
        if std::fs::symlink_metadata(&link).is_ok_and(|m| m.file_type().is_symlink()) {
            return Ok(link);
        }
    }
    Ok(resolved)
}

/// Refuse to move or delete the current directory or one of its parents.
fn guard_current_dir(sandbox: &Sandbox, path: &Path, arg: &str) -> Result<(), String> {
    if sandbox.current_dir().starts_with(path) {
        return Err(format!("Cannot remove {arg}: it contains the current directory"));
    }
    Ok(())
}

/// Destination for `source`: inside `dest` when it is an existing directory.
fn destination(source: &Path, dest: PathBuf) -> PathBuf {
    match source.file_name() {
        Some(name) if dest.is_dir() => dest.join(name),
        _ => dest,
    }
}

/// Confirm writing to `dest`: an overwrite prompt if it exists, otherwise a
/// prompt for `action` previewing `summary`.
async fn confirm_target(
    files: &FileTools,
    action: ConfirmAction,
    dest: &Path,
    summary: String,
) -> Result<(), String> {
    let allowed = if tokio::fs::symlink_metadata(dest).await.is_ok() {
        files.confirm_overwrite(dest).await.map_err(|e| e.message)?
    } else {
        files.confirm(action, dest.to_path_buf(), summary).await
    };
    if allowed {
        Ok(())
    } else {
        Err("Cancelled".to_string())
    }
}

fn source_and_dest<'a>(command: &str, args: &'a [String]) -> Result<(&'a str, &'a str), String> {
    match args {
        [source, dest, ..] => Ok((source.as_str(), dest.as_str())),
        _ => Err(format!("{command} requires source and destination")),
    }
}

async fn copy(files: &FileTools, args: &[String]) -> Result<String, String> {
    let (source_arg, dest_arg) = source_and_dest("cp", args)?;
    let sandbox = files.sandbox();
    let source = sandbox.resolve_and_check(source_arg, "read").map_err(violation)?;
    let dest = sandbox.resolve_and_check(dest_arg, "write").map_err(violation)?;
    if !source.exists() {
        return Err(format!("{source_arg} does not exist"));
    }
    let dest = destination(&source, dest);
    if source.is_dir() && dest.starts_with(&source) {
        return Err(format!("Cannot copy {source_arg} into itself"));
    }

    let summary = format!("{source_arg} -> {}", sandbox.display_path(&dest));
    confirm_target(files, ConfirmAction::Copy, &dest, summary).await?;

    let (from, to) = (source.clone(), dest.clone());
    tokio::task::spawn_blocking(move || {
        if from.is_dir() {
            copy_tree(&from, &to)
        } else {
            std::fs::copy(&from, &to).map(|_| ())
        }
    })
    .await
    .map_err(|e| format!("cp failed: {e}"))?
    .map_err(|e| format!("{source_arg}: {e}"))?;
    info!("Copied {} to {}", source.display(), dest.display());
    Ok(format!("Copied {source_arg} to {dest_arg}"))
}

/// Recursive directory copy. Symlinks inside the tree are skipped.
fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    if to.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", to.display()),
        ));
    }
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let kind = entry.file_type()?;
        let target = to.join(entry.file_name());
        if kind.is_symlink() {
            warn!("Skipping symlink {}", entry.path().display());
        } else if kind.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

async fn move_entry(files: &FileTools, args: &[String]) -> Result<String, String> {
    let (source_arg, dest_arg) = source_and_dest("mv", args)?;
    let sandbox = files.sandbox();
    let source = entry(sandbox, source_arg, "move")?;
    let dest = sandbox.resolve_and_check(dest_arg, "write").map_err(violation)?;
    if tokio::fs::symlink_metadata(&source).await.is_err() {
        return Err(format!("{source_arg} does not exist"));
    }
    guard_current_dir(sandbox, &source, source_arg)?;
    let dest = destination(&source, dest);
    if dest.starts_with(&source) {
        return Err(format!("Cannot move {source_arg} into itself"));
    }

    let summary = format!("{source_arg} -> {}", sandbox.display_path(&dest));
    confirm_target(files, ConfirmAction::Move, &dest, summary).await?;

    tokio::fs::rename(&source, &dest)
        .await
        .map_err(|e| format!("{source_arg}: {e}"))?;
    info!("Moved {} to {}", source.display(), dest.display());
    Ok(format!("Moved {source_arg} to {dest_arg}"))
}

async fn remove(files: &FileTools, args: &[String]) -> Result<String, String> {
    let recursive = args.iter().any(|a| a == "-r" || a == "-rf");
    let paths: Vec<&String> = args.iter().filter(|a| !a.starts_with('-')).collect();
    if paths.is_empty() {
        return Err("rm requires at least one path".to_string());
    }
    let sandbox = files.sandbox();
    let mut out = Vec::new();
    for path in paths {
        let target = entry(sandbox, path, "delete")?;
        let Ok(meta) = tokio::fs::symlink_metadata(&target).await else {
            out.push(format!("Warning: {path} does not exist"));
            continue;
        };
        guard_current_dir(sandbox, &target, path)?;
        let is_dir = meta.is_dir();
        if is_dir && !recursive {
            return Err(format!("{path} is a directory (use -r for recursive)"));
        }

        let preview = if is_dir {
            "Directory and everything in it".to_string()
        } else {
            String::new()
        };
        if !files.confirm(ConfirmAction::Delete, target.clone(), preview).await {
            out.push(format!("Skipped: {path}"));
            continue;
        }
        let removed = if is_dir {
            tokio::fs::remove_dir_all(&target).await
        } else {
            tokio::fs::remove_file(&target).await
        };
        removed.map_err(|e| format!("{path}: {e}"))?;
        info!("Removed {}", target.display());
        out.push(format!("Removed: {path}"));
    }
    Ok(out.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grok_rs::tools::{ConfirmGate, ConfirmRequest, Decision, FnConfirmer, ValidatorSet};
    use std::sync::{Arc, Mutex};

    fn files_with(dir: &Path, gate: ConfirmGate) -> FileTools {
        FileTools::new(
            Arc::new(Sandbox::new(dir).unwrap()),
            Arc::new(gate),
            Arc::new(ValidatorSet::new()),
        )
    }

    fn files(dir: &Path) -> FileTools {
        files_with(dir, ConfirmGate::auto())
    }

    /// Gate that records every request and answers with `decision`.
    fn recording(decision: Decision) -> (ConfirmGate, Arc<Mutex<Vec<ConfirmRequest>>>) {
        let seen: Arc<Mutex<Vec<ConfirmRequest>>> = Arc::default();
        let log = Arc::clone(&seen);
        let gate = ConfirmGate::new(
            Arc::new(FnConfirmer(move |req: &ConfirmRequest| {
                log.lock().unwrap().push(req.clone());
                decision.clone()
            })),
            false,
        );
        (gate, seen)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn ls_cd_cat_pwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(dir.path().join("README"), "hi\n").unwrap();
        let files = files(dir.path());

        assert_eq!(run(&files, "ls", &[]).await.unwrap(), "src/\nREADME");
        assert_eq!(run(&files, "cd", &args(&["src"])).await.unwrap(), "src");
        assert!(run(&files, "pwd", &[]).await.unwrap().contains("Launch:"));
        assert_eq!(
            run(&files, "cat", &args(&["main.rs"])).await.unwrap(),
            "fn main() {}\n"
        );
        assert_eq!(run(&files, "cd", &args(&[".."])).await.unwrap(), ".");
    }

    #[tokio::test]
    async fn bare_cd_returns_to_launch_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        let files = files(dir.path());
        run(&files, "cd", &args(&["a/b"])).await.unwrap();
        assert_eq!(run(&files, "cd", &[]).await.unwrap(), ".");
        assert_eq!(files.sandbox().current_dir(), files.sandbox().root());
    }

    #[tokio::test]
    async fn cd_outside_root_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        let err = run(&files, "cd", &args(&[".."])).await;
        // Already at the root: `..` leaves the sandbox.
        assert!(err.unwrap_err().starts_with("SANDBOX VIOLATION"));
        assert_eq!(files.sandbox().current_dir(), files.sandbox().root());
    }

    #[tokio::test]
    async fn head_and_tail() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (1..=15).map(|i| format!("line {i}\n")).collect();
        std::fs::write(dir.path().join("log.txt"), body).unwrap();
        let files = files(dir.path());

        let head = run(&files, "head", &args(&["log.txt"])).await.unwrap();
        assert_eq!(head.lines().count(), DEFAULT_LINES);
        assert!(head.starts_with("line 1\n"));
        assert_eq!(
            run(&files, "tail", &args(&["-n", "2", "log.txt"])).await.unwrap(),
            "line 14\nline 15"
        );
        assert_eq!(
            run(&files, "head", &args(&["-n", "x", "log.txt"])).await.unwrap_err(),
            "Invalid number: x"
        );
        assert_eq!(
            run(&files, "tail", &[]).await.unwrap_err(),
            "tail requires a file argument"
        );
        assert_eq!(
            run(&files, "head", &args(&["../x"])).await.unwrap_err().split(':').next(),
            Some("Permission denied")
        );
    }

    #[tokio::test]
    async fn mkdir_and_tree() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        assert_eq!(
            run(&files, "mkdir", &args(&["-p", "src/bin"])).await.unwrap(),
            "Created: src/bin"
        );
        assert_eq!(
            run(&files, "mkdir", &args(&["src"])).await.unwrap(),
            "Warning: src already exists"
        );
        assert!(run(&files, "mkdir", &args(&["x/y"])).await.is_err());
        assert!(
            run(&files, "mkdir", &args(&["../out"]))
                .await
                .unwrap_err()
                .starts_with("SANDBOX VIOLATION")
        );

        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/bin/main.rs"), "").unwrap();
        std::fs::write(dir.path().join(".hidden"), "").unwrap();
        let drawn = run(&files, "tree", &args(&["src"])).await.unwrap();
        assert_eq!(drawn, "src/\n├── bin/\n│   └── main.rs\n└── lib.rs");
        assert_eq!(
            run(&files, "tree", &args(&["src/lib.rs"])).await.unwrap_err(),
            "src/lib.rs is not a directory"
        );
    }

    #[tokio::test]
    async fn cp_confirms_and_copies_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        std::fs::write(dir.path().join("pkg/sub/a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "n").unwrap();
        let (gate, seen) = recording(Decision::Accept);
        let files = files_with(dir.path(), gate);

        assert_eq!(
            run(&files, "cp", &args(&["notes.txt", "copy.txt"])).await.unwrap(),
            "Copied notes.txt to copy.txt"
        );
        assert_eq!(std::fs::read_to_string(dir.path().join("copy.txt")).unwrap(), "n");

        run(&files, "cp", &args(&["pkg", "pkg2"])).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("pkg2/sub/a.txt")).unwrap(),
            "a"
        );

        // Existing target asks to overwrite.
        run(&files, "cp", &args(&["notes.txt", "copy.txt"])).await.unwrap();
        let actions: Vec<ConfirmAction> = seen.lock().unwrap().iter().map(|r| r.action).collect();
        assert_eq!(
            actions,
            vec![ConfirmAction::Copy, ConfirmAction::Copy, ConfirmAction::Overwrite]
        );

        assert_eq!(
            run(&files, "cp", &args(&["notes.txt"])).await.unwrap_err(),
            "cp requires source and destination"
        );
        assert!(
            run(&files, "cp", &args(&["notes.txt", "../stolen.txt"]))
                .await
                .unwrap_err()
                .starts_with("SANDBOX VIOLATION")
        );
    }

    #[tokio::test]
    async fn declined_mv_and_rm_leave_files_in_place() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "k").unwrap();
        let files = files_with(dir.path(), ConfirmGate::default());

        assert_eq!(
            run(&files, "mv", &args(&["keep.txt", "moved.txt"])).await.unwrap_err(),
            "Cancelled"
        );
        assert_eq!(
            run(&files, "rm", &args(&["keep.txt"])).await.unwrap(),
            "Skipped: keep.txt"
        );
        assert!(dir.path().join("keep.txt").exists());
        assert!(!dir.path().join("moved.txt").exists());
    }

    #[tokio::test]
    async fn mv_into_directory_and_rm() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("archive")).unwrap();
        std::fs::create_dir(dir.path().join("build")).unwrap();
        std::fs::write(dir.path().join("build/out.o"), "").unwrap();
        std::fs::write(dir.path().join("old.txt"), "o").unwrap();
        let (gate, seen) = recording(Decision::Accept);
        let files = files_with(dir.path(), gate);

        run(&files, "mv", &args(&["old.txt", "archive"])).await.unwrap();
        assert!(dir.path().join("archive/old.txt").exists());
        assert!(!dir.path().join("old.txt").exists());

        assert_eq!(
            run(&files, "rm", &args(&["build"])).await.unwrap_err(),
            "build is a directory (use -r for recursive)"
        );
        assert_eq!(
            run(&files, "rm", &args(&["-r", "build", "ghost"])).await.unwrap(),
            "Removed: build\nWarning: ghost does not exist"
        );
        assert!(!dir.path().join("build").exists());

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].action, ConfirmAction::Move);
        assert_eq!(seen[1].action, ConfirmAction::Delete);
        assert_eq!(seen[1].preview, "Directory and everything in it");
    }

    #[tokio::test]
    async fn rm_refuses_launch_and_current_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("work")).unwrap();
        let files = files(dir.path());
        assert!(run(&files, "rm", &args(&["-r", "."])).await.is_err());
        run(&files, "cd", &args(&["work"])).await.unwrap();
        assert!(run(&files, "rm", &args(&["-r", "../work"])).await.is_err());
        assert!(run(&files, "mv", &args(&["../work", "../moved"])).await.is_err());
        assert!(dir.path().join("work").is_dir());
        assert!(
            run(&files, "rm", &args(&["-r", "../.."]))
                .await
                .unwrap_err()
                .starts_with("SANDBOX VIOLATION")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rm_deletes_a_link_not_its_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink("real.txt", dir.path().join("alias")).unwrap();
        let files = files(dir.path());
        run(&files, "rm", &args(&["alias"])).await.unwrap();
        assert!(dir.path().join("real.txt").exists());
        assert!(std::fs::symlink_metadata(dir.path().join("alias")).is_err());
    }

    #[tokio::test]
    async fn errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let files = files(dir.path());
        assert_eq!(
            run(&files, "cat", &args(&["missing.txt"])).await.unwrap_err(),
            "File not found: missing.txt"
        );
        assert!(run(&files, "cat", &[]).await.is_err());
        assert!(is_shell_command("rm"));
        assert!(!is_shell_command("sudo"));
    }
}
