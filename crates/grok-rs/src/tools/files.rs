//! The four file tools exposed to the model.
//!
//! | Tool | Name | Purpose |
//! |------|------|---------|
//! | [`ReadFile`] | `read_file` | Read a text file |
//! | [`WriteFile`] | `write_file` | Create or overwrite a file |
//! | [`EditFile`] | `edit_file` | Replace every literal occurrence of a string |
//! | [`ListFiles`] | `list_files` | List a directory |
//!
//! All four share one [`FileTools`] context: the [`Sandbox`] every path goes
//! through, the [`ConfirmGate`] every mutation waits on, and the
//! [`ValidatorSet`] run over proposed content. Writes replace the target
//! atomically.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::fs;
use tracing::{debug, info};

use super::confirm::{ConfirmAction, ConfirmGate, ConfirmRequest, Decision};
use super::core::{
    Tool, ToolError, ToolErrorKind, ToolFuture, ToolOutcome, ToolSet, outcome_to_string,
    parse_tool_args,
};
use super::diff::{new_file_preview, unified_diff};
use super::names;
use super::validate::{ValidationReport, ValidatorSet};
use crate::ToolDef;
use crate::persist::write_atomic_async;
use crate::sandbox::Sandbox;

// ── Typed argument structs ──────────────────────────────────────────

/// Typed arguments for `read_file`.
#[derive(Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// The path to the file to read (relative to current directory).
    pub path: String,
}

/// Typed arguments for `write_file`.
#[derive(Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// The path to the file to write (relative to current directory).
    pub path: String,
    /// The content to write to the file.
    pub content: String,
}

/// Typed arguments for `edit_file`.
#[derive(Deserialize, JsonSchema)]
pub struct EditFileArgs {
    /// The path to the file to edit.
    pub path: String,
    /// The exact text to find and replace.
    pub old_text: String,
    /// The text to replace it with.
    pub new_text: String,
}

fn default_list_path() -> String {
    ".".to_string()
}

/// Typed arguments for `list_files`.
#[derive(Deserialize, JsonSchema)]
pub struct ListFilesArgs {
    /// The directory path to list (defaults to current directory).
    #[serde(default = "default_list_path")]
    pub path: String,
}

// ── Shared context ──────────────────────────────────────────────────

/// Sandbox, confirmation gate and validators shared by the file tools.
pub struct FileTools {
    sandbox: Arc<Sandbox>,
    gate: Arc<ConfirmGate>,
    validators: Arc<ValidatorSet>,
}

impl FileTools {
    pub fn new(sandbox: Arc<Sandbox>, gate: Arc<ConfirmGate>, validators: Arc<ValidatorSet>) -> Self {
        Self {
            sandbox,
            gate,
            validators,
        }
    }

    pub fn sandbox(&self) -> &Arc<Sandbox> {
        &self.sandbox
    }

    pub fn gate(&self) -> &Arc<ConfirmGate> {
        &self.gate
    }

    /// Return the full text of a regular file.
    pub async fn read(&self, path: &str) -> ToolOutcome {
        let resolved = self.sandbox.resolve_and_check(path, "read")?;
        let meta = metadata(&resolved, || format!("File not found: {path}")).await?;
        if !meta.is_file() {
            return Err(ToolError::new(
                ToolErrorKind::NotAFile,
                format!("Not a file: {path}"),
            ));
        }
        let content = fs::read_to_string(&resolved)
            .await
            .map_err(|e| io_error(path, e))?;
        debug!("Read {} bytes from {path}", content.len());
        Ok(content)
    }

    /// Create or overwrite a file after preview, validation and confirmation.
    pub async fn write(&self, path: &str, content: &str) -> ToolOutcome {
        let mut target = path.to_string();
        let resolved = loop {
            let resolved = self.sandbox.resolve_and_check(&target, "write")?;
            let existing = read_existing(&resolved, &target).await?;

            let (action, preview) = match &existing {
                Some(old) => (
                    ConfirmAction::Overwrite,
                    unified_diff(old, content, &self.sandbox.display_path(&resolved)),
                ),
                None => (ConfirmAction::Create, new_file_preview(content)),
            };
            let validation = self.validators.validate(content, &target);
            self.reject_invalid_when_unattended(&target, validation.as_ref())?;

            let request = ConfirmRequest {
                action,
                path: resolved.clone(),
                preview,
                validation,
            };
            match self.gate.decide(&request).await {
                Decision::Accept => break resolved,
                Decision::Reject => return Err(declined()),
                Decision::Rename(new_path) => {
                    info!("Write redirected from {target} to {new_path}");
                    target = new_path;
                }
            }
        };

        write_atomic_async(&resolved, content)
            .await
            .map_err(|e| io_error(&target, e))?;
        info!("Wrote {} bytes to {target}", content.len());
        Ok(format!(
            "Successfully wrote {} bytes to {target}",
            content.len()
        ))
    }

    /// Replace every occurrence of `old_text` with `new_text`.
    pub async fn edit(&self, path: &str, old_text: &str, new_text: &str) -> ToolOutcome {
        let (resolved, content) = self.existing_file(path, "edit").await?;
        if old_text.is_empty() {
            return Err(ToolError::new(
                ToolErrorKind::InvalidArguments,
                "old_text must not be empty",
            ));
        }
        let occurrences = content.matches(old_text).count();
        if occurrences == 0 {
            return Err(ToolError::new(
                ToolErrorKind::TextNotFound,
                format!("Text not found in {path}"),
            ));
        }
        let updated = content.replace(old_text, new_text);
        self.apply_edit(path, &resolved, &content, &updated).await?;
        info!("Edited {path} ({occurrences} replacement(s))");
        Ok(format!(
            "Successfully edited {path} ({occurrences} replacement(s))"
        ))
    }

    /// Replace the whole content of an existing file, confirmed as an edit
    /// with a diff preview.
    pub async fn rewrite(&self, path: &str, content: &str) -> ToolOutcome {
        let (resolved, original) = self.existing_file(path, "edit").await?;
        self.apply_edit(path, &resolved, &original, content).await?;
        info!("Rewrote {path} ({} bytes)", content.len());
        Ok(format!("Updated: {path}"))
    }

    /// Ask before replacing an existing `path` whose new content is not
    /// previewed (copy and move targets).
    pub async fn confirm_overwrite(&self, path: impl AsRef<Path>) -> Result<bool, ToolError> {
        let gate = &self.gate;
        let allowed = self
            .sandbox
            .confirm_overwrite(path, gate.auto_confirm(), |resolved| async move {
                let request = ConfirmRequest {
                    action: ConfirmAction::Overwrite,
                    path: resolved,
                    preview: String::new(),
                    validation: None,
                };
                gate.decide(&request).await == Decision::Accept
            })
            .await?;
        Ok(allowed)
    }

    /// Ask the gate about a mutation made outside the model's tools.
    pub async fn confirm(&self, action: ConfirmAction, path: PathBuf, preview: String) -> bool {
        let request = ConfirmRequest {
            action,
            path,
            preview,
            validation: None,
        };
        self.gate.decide(&request).await == Decision::Accept
    }

    async fn existing_file(&self, path: &str, operation: &str) -> Result<(PathBuf, String), ToolError> {
        let resolved = self.sandbox.resolve_and_check(path, operation)?;
        let meta = metadata(&resolved, || format!("File not found: {path}")).await?;
        if !meta.is_file() {
            return Err(ToolError::new(
                ToolErrorKind::NotAFile,
                format!("Not a file: {path}"),
            ));
        }
        let content = fs::read_to_string(&resolved)
            .await
            .map_err(|e| io_error(path, e))?;
        Ok((resolved, content))
    }

    /// Validate, preview as a diff, confirm, then write `updated`.
    async fn apply_edit(
        &self,
        path: &str,
        resolved: &Path,
        original: &str,
        updated: &str,
    ) -> Result<(), ToolError> {
        let validation = self.validators.validate(updated, path);
        self.reject_invalid_when_unattended(path, validation.as_ref())?;

        let request = ConfirmRequest {
            action: ConfirmAction::Edit,
            path: resolved.to_path_buf(),
            preview: unified_diff(original, updated, &self.sandbox.display_path(resolved)),
            validation,
        };
        if self.gate.decide(&request).await != Decision::Accept {
            return Err(declined());
        }
        write_atomic_async(resolved, updated)
            .await
            .map_err(|e| io_error(path, e))
    }

    /// Newline-joined directory listing: directories first (with `/`), then
    /// files, case-insensitive by name, dotfiles skipped.
    pub async fn list(&self, path: &str) -> ToolOutcome {
        let resolved = self.sandbox.resolve_and_check(path, "list")?;
        let meta = metadata(&resolved, || format!("Directory not found: {path}")).await?;
        if !meta.is_dir() {
            return Err(ToolError::new(
                ToolErrorKind::NotADirectory,
                format!("Not a directory: {path}"),
            ));
        }

        let mut entries: Vec<(bool, String)> = Vec::new();
        let mut dir = fs::read_dir(&resolved)
            .await
            .map_err(|e| io_error(path, e))?;
        while let Some(entry) = dir.next_entry().await.map_err(|e| io_error(path, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            // Follow symlinks for the directory check, like a plain `stat`.
            let is_dir = fs::metadata(entry.path())
                .await
                .map(|m| m.is_dir())
                .unwrap_or(false);
            entries.push((is_dir, name));
        }

        if entries.is_empty() {
            return Ok("(empty directory)".to_string());
        }
        entries.sort_by_key(|(is_dir, name)| (!*is_dir, name.to_lowercase()));
        Ok(entries
            .into_iter()
            .map(|(is_dir, name)| if is_dir { format!("{name}/") } else { name })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// With nobody watching, content that fails validation goes back to the
    /// model instead of onto disk.
    fn reject_invalid_when_unattended(
        &self,
        path: &str,
        validation: Option<&ValidationReport>,
    ) -> Result<(), ToolError> {
        match validation {
            Some(report) if report.has_errors() && self.gate.auto_confirm() => {
                Err(ToolError::new(
                    ToolErrorKind::ValidationRejected,
                    format!(
                        "Validation failed for {path}:\n{}",
                        report.format_report()
                    ),
                ))
            }
            _ => Ok(()),
        }
    }
}

fn declined() -> ToolError {
    ToolError::new(ToolErrorKind::UserDeclined, "User cancelled")
}

fn io_error(path: &str, e: io::Error) -> ToolError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        ToolError::new(ToolErrorKind::Io, format!("Permission denied: {e}"))
    } else {
        ToolError::new(ToolErrorKind::Io, format!("{path}: {e}"))
    }
}

async fn metadata(
    resolved: &Path,
    not_found: impl FnOnce() -> String,
) -> Result<std::fs::Metadata, ToolError> {
    match fs::metadata(resolved).await {
        Ok(meta) => Ok(meta),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(ToolError::new(ToolErrorKind::NotFound, not_found()))
        }
        Err(e) => Err(io_error(&resolved.display().to_string(), e)),
    }
}

/// Current content of a write target, `None` if it does not exist yet.
async fn read_existing(resolved: &Path, path: &str) -> Result<Option<String>, ToolError> {
    match fs::metadata(resolved).await {
        Ok(meta) if meta.is_dir() => Err(ToolError::new(
            ToolErrorKind::NotAFile,
            format!("Not a file: {path}"),
        )),
        Ok(_) => fs::read_to_string(resolved)
            .await
            .map(Some)
            .map_err(|e| io_error(path, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, e)),
    }
}

// ── Tool wrappers ───────────────────────────────────────────────────

/// `read_file` tool.
pub struct ReadFile(Arc<FileTools>);

impl Tool for ReadFile {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::READ_FILE,
            "Read the contents of a file. Use this to examine existing code or text files.",
            crate::json_schema_for::<ReadFileArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let outcome = match parse_tool_args::<ReadFileArgs>(&arguments) {
                Ok(args) => self.0.read(&args.path).await,
                Err(e) => Err(e),
            };
            outcome_to_string(outcome)
        })
    }
}

/// `write_file` tool.
pub struct WriteFile(Arc<FileTools>);

impl Tool for WriteFile {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::WRITE_FILE,
            "Write content to a file. Creates the file if it doesn't exist, or overwrites \
             if it does. Always use this when the user asks you to create a file or save code.",
            crate::json_schema_for::<WriteFileArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let outcome = match parse_tool_args::<WriteFileArgs>(&arguments) {
                Ok(args) => self.0.write(&args.path, &args.content).await,
                Err(e) => Err(e),
            };
            outcome_to_string(outcome)
        })
    }

    fn is_mutation(&self) -> bool {
        true
    }
}

/// `edit_file` tool.
pub struct EditFile(Arc<FileTools>);

impl Tool for EditFile {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::EDIT_FILE,
            "Edit an existing file by replacing specific text. Every exact occurrence of \
             old_text is replaced. Use this for modifications to existing files.",
            crate::json_schema_for::<EditFileArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let outcome = match parse_tool_args::<EditFileArgs>(&arguments) {
                Ok(args) => self.0.edit(&args.path, &args.old_text, &args.new_text).await,
                Err(e) => Err(e),
            };
            outcome_to_string(outcome)
        })
    }

    fn is_mutation(&self) -> bool {
        true
    }
}

/// `list_files` tool.
pub struct ListFiles(Arc<FileTools>);

impl Tool for ListFiles {
    fn definition(&self) -> ToolDef {
        ToolDef::new(
            names::LIST_FILES,
            "List files and directories in a given path.",
            crate::json_schema_for::<ListFilesArgs>(),
        )
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let outcome = match parse_tool_args::<ListFilesArgs>(&arguments) {
                Ok(args) => self.0.list(&args.path).await,
                Err(e) => Err(e),
            };
            outcome_to_string(outcome)
        })
    }
}

impl ToolSet {
    /// Register `read_file`, `write_file`, `edit_file` and `list_files`
    /// over a shared context.
    pub fn with_file_tools(self, tools: Arc<FileTools>) -> Self {
        self.with(ReadFile(Arc::clone(&tools)))
            .with(WriteFile(Arc::clone(&tools)))
            .with(EditFile(Arc::clone(&tools)))
            .with(ListFiles(tools))
    }
}

// ── Tests ───────────────────────────────────────────────────────────
