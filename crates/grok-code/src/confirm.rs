//! Terminal confirmation prompt for file mutations.
//!
//! Shows the diff or preview and any validator output, then asks
//! `[y/N/r]`. Answers come from the same [`Lines`] stream the REPL reads;
//! anything but `y`/`yes` (or `r` followed by a path where renaming is
//! allowed) rejects.

use std::io::Write;
use std::sync::Mutex;

use grok_rs::tools::{ConfirmFuture, ConfirmRequest, Confirmer, Decision};

use crate::input::Lines;

/// Parsed answer to the confirmation question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Rename,
}

pub fn parse_answer(input: &str, allows_rename: bool) -> Answer {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Answer::Yes,
        "r" | "rename" if allows_rename => Answer::Rename,
        _ => Answer::No,
    }
}

/// A [`Confirmer`] reading answers from a line stream.
pub struct TerminalConfirmer {
    lines: Lines,
    output: Mutex<Box<dyn Write + Send>>,
}

impl TerminalConfirmer {
    /// Prompt on stderr.
    pub fn stdio(lines: Lines) -> Self {
        Self::with_output(lines, std::io::stderr())
    }

    pub fn with_output(lines: Lines, output: impl Write + Send + 'static) -> Self {
        Self {
            lines,
            output: Mutex::new(Box::new(output)),
        }
    }

    fn show(&self, request: &ConfirmRequest) -> std::io::Result<()> {
        let mut out = self.output.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out)?;
        writeln!(out, "{}: {}", request.action.label(), request.path.display())?;
        if !request.preview.is_empty() {
            writeln!(out, "{}", request.preview)?;
        }
        if let Some(report) = request.validation.as_ref().filter(|r| !r.is_clean()) {
            writeln!(out, "{}", report.format_report())?;
        }
        let choices = if request.action.allows_rename() {
            "[y/N/r(ename)]"
        } else {
            "[y/N]"
        };
        write!(out, "{} {choices} ", request.action.prompt())?;
        out.flush()
    }

    fn ask_new_path(&self) {
        let mut out = self.output.lock().unwrap_or_else(|e| e.into_inner());
        let _ = write!(out, "New path: ");
        let _ = out.flush();
    }

    async fn answer(&self) -> Option<String> {
        self.lines.next().await.map(|line| line.trim().to_string())
    }
}

impl Confirmer for TerminalConfirmer {
    fn confirm<'a>(&'a self, request: &'a ConfirmRequest) -> ConfirmFuture<'a> {
        Box::pin(async move {
            if self.show(request).is_err() {
                return Decision::Reject;
            }
            let Some(answer) = self.answer().await else {
                return Decision::Reject;
            };
            match parse_answer(&answer, request.action.allows_rename()) {
                Answer::Yes => Decision::Accept,
                Answer::No => Decision::Reject,
                Answer::Rename => {
                    self.ask_new_path();
                    match self.answer().await {
                        Some(path) if !path.is_empty() => Decision::Rename(path),
                        _ => Decision::Reject,
                    }
                }
            }
        })
    }
}
