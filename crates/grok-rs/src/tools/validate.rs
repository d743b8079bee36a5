//! Content validators run before a file is written.
//!
//! A [`ValidatorSet`] picks validators by file extension and merges their
//! findings into one [`ValidationReport`]. Errors block auto-confirmed writes
//! so the model gets a chance to fix its output; warnings are advisory.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Errors and warnings found in proposed file content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Render as `ERRORS:` / `WARNINGS:` sections with `  - ` bullets.
    /// Empty when the report is clean.
    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        if !self.errors.is_empty() {
            lines.push("ERRORS:".to_string());
            lines.extend(self.errors.iter().map(|e| format!("  - {e}")));
        }
        if !self.warnings.is_empty() {
            lines.push("WARNINGS:".to_string());
            lines.extend(self.warnings.iter().map(|w| format!("  - {w}")));
        }
        lines.join("\n")
    }
}

/// A content checker for one family of files.
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    /// Lowercase extensions (without the dot) this validator handles. An
    /// empty slice means every file.
    fn extensions(&self) -> &[&str];

    fn validate(&self, content: &str, filename: &str) -> ValidationReport;
}

// ── Built-in validators ────────────────────────────────────────────

pub struct JsonValidator;

impl Validator for JsonValidator {
    fn name(&self) -> &str {
        "json"
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }

    fn validate(&self, content: &str, _filename: &str) -> ValidationReport {
        let mut report = ValidationReport::default();
        if let Err(e) = serde_json::from_str::<serde_json::Value>(content) {
            report.errors.push(format!(
                "Line {}, column {}: {}",
                e.line(),
                e.column(),
                json_error_message(&e)
            ));
        }
        report
    }
}

/// serde_json's Display appends " at line X column Y"; strip it since the
/// position is already in the prefix.
fn json_error_message(e: &serde_json::Error) -> String {
    let full = e.to_string();
    let suffix = format!(" at line {} column {}", e.line(), e.column());
    full.strip_suffix(&suffix).unwrap_or(&full).to_string()
}

pub struct TomlValidator;

impl Validator for TomlValidator {
    fn name(&self) -> &str {
        "toml"
    }

    fn extensions(&self) -> &[&str] {
        &["toml"]
    }

    fn validate(&self, content: &str, _filename: &str) -> ValidationReport {
        let mut report = ValidationReport::default();
        if let Err(e) = content.parse::<toml::Table>() {
            report.errors.push(e.to_string().trim_end().to_string());
        }
        report
    }
}

/// Structural LaTeX checks: document environment, brace balance and
/// `\begin`/`\end` pairing.
pub struct LatexValidator;

fn environment_regex(kind: &str) -> Option<&'static Regex> {
    static BEGIN: OnceLock<Option<Regex>> = OnceLock::new();
    static END: OnceLock<Option<Regex>> = OnceLock::new();
    let (cell, pattern) = match kind {
        "begin" => (&BEGIN, r"\\begin\{(\w+)\}"),
        _ => (&END, r"\\end\{(\w+)\}"),
    };
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn count_environments(content: &str, kind: &str) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    if let Some(re) = environment_regex(kind) {
        for caps in re.captures_iter(content) {
            *counts.entry(caps[1].to_string()).or_insert(0) += 1;
        }
    }
    counts
}

impl Validator for LatexValidator {
    fn name(&self) -> &str {
        "latex"
    }

    fn extensions(&self) -> &[&str] {
        &["tex"]
    }

    fn validate(&self, content: &str, _filename: &str) -> ValidationReport {
        let mut report = ValidationReport::default();

        let has_begin = content.contains("\\begin{document}");
        let has_end = content.contains("\\end{document}");
        if has_begin && !has_end {
            report.errors.push("Missing \\end{document}".into());
        }
        if has_end && !has_begin {
            report.errors.push("Missing \\begin{document}".into());
        }

        let open = content.matches('{').count();
        let close = content.matches('}').count();
        if open != close {
            report
                .errors
                .push(format!("Unmatched braces: {open} opening, {close} closing"));
        }

        let begins = count_environments(content, "begin");
        let ends = count_environments(content, "end");
        let mut names: Vec<&String> = begins.keys().chain(ends.keys()).collect();
        names.sort();
        names.dedup();
        for env in names {
            let b = begins.get(env).copied().unwrap_or(0);
            let e = ends.get(env).copied().unwrap_or(0);
            if b != e {
                report.errors.push(format!(
                    "Unmatched environment '{env}': {b} \\begin, {e} \\end"
                ));
            }
        }

        report
    }
}

/// Generic hygiene warnings for any text file.
pub struct WhitespaceValidator;

impl Validator for WhitespaceValidator {
    fn name(&self) -> &str {
        "whitespace"
    }

    fn extensions(&self) -> &[&str] {
        &[]
    }

    fn validate(&self, content: &str, _filename: &str) -> ValidationReport {
        let mut report = ValidationReport::default();

        let trailing = content
            .lines()
            .filter(|l| l.ends_with(' ') || l.ends_with('\t'))
            .count();
        if trailing > 0 {
            report
                .warnings
                .push(format!("{trailing} line(s) with trailing whitespace"));
        }

        let tab_indented = content.lines().any(|l| l.starts_with('\t'));
        let space_indented = content.lines().any(|l| l.starts_with("  "));
        if tab_indented && space_indented {
            report
                .warnings
                .push("Mixed tab and space indentation".to_string());
        }

        report
    }
}

// ── Validator set ──────────────────────────────────────────────────

/// Extension-dispatched collection of validators.
#[derive(Default)]
pub struct ValidatorSet {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidatorSet {
    /// An empty set: validation always passes.
    pub fn new() -> Self {
        Self::default()
    }

    /// JSON, TOML, LaTeX and whitespace checks.
    pub fn builtin() -> Self {
        Self::new()
            .with(JsonValidator)
            .with(TomlValidator)
            .with(LatexValidator)
            .with(WhitespaceValidator)
    }

    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Extensions with a dedicated validator.
    pub fn supported_extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self
            .validators
            .iter()
            .flat_map(|v| v.extensions().iter().copied())
            .collect();
        exts.sort_unstable();
        exts.dedup();
        exts
    }

    /// Run every applicable validator. `None` when none applies.
    pub fn validate(&self, content: &str, filename: &str) -> Option<ValidationReport> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let mut report: Option<ValidationReport> = None;
        for validator in &self.validators {
            let exts = validator.extensions();
            if !exts.is_empty() && !exts.contains(&ext.as_str()) {
                continue;
            }
            report
                .get_or_insert_with(ValidationReport::default)
                .merge(validator.validate(content, filename));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_formats_sections() {
        let report = ValidationReport {
            errors: vec!["bad".into()],
            warnings: vec!["meh".into(), "hmm".into()],
        };
        assert_eq!(
            report.format_report(),
            "ERRORS:\n  - bad\nWARNINGS:\n  - meh\n  - hmm"
        );
        assert_eq!(ValidationReport::default().format_report(), "");
    }

    #[test]
    fn json_reports_position() {
        let report = JsonValidator.validate("{\n  \"a\": 1,\n}", "x.json");
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("Line 3, column 1: "), "{:?}", report.errors);
        assert!(!report.errors[0].contains(" at line "));
        assert!(JsonValidator.validate("{\"a\": [1, 2]}", "x.json").is_clean());
    }

    #[test]
    fn toml_reports_errors() {
        assert!(TomlValidator.validate("a = 1\n[b]\nc = \"x\"\n", "c.toml").is_clean());
        assert!(TomlValidator.validate("a = \n", "c.toml").has_errors());
    }

    #[test]
    fn latex_basic_checks() {
        let doc = "\\documentclass{article}\n\\begin{document}\n\\begin{itemize}\n\\item x\n\\end{document}\n";
        let report = LatexValidator.validate(doc, "paper.tex");
        assert_eq!(
            report.errors,
            vec!["Unmatched environment 'itemize': 1 \\begin, 0 \\end".to_string()]
        );

        let report = LatexValidator.validate("\\begin{document}\n{x\n", "paper.tex");
        assert!(report.errors.contains(&"Missing \\end{document}".to_string()));
        assert!(
            report
                .errors
                .contains(&"Unmatched braces: 2 opening, 1 closing".to_string())
        );
    }

    #[test]
    fn whitespace_warnings() {
        let report = WhitespaceValidator.validate("a  \n\tb\n  c\n", "x.txt");
        assert_eq!(report.warnings.len(), 2);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn set_dispatches_by_extension() {
        let set = ValidatorSet::builtin();
        assert_eq!(set.supported_extensions(), vec!["json", "tex", "toml"]);

        let report = set.validate("{", "CONFIG.JSON").unwrap();
        assert!(report.has_errors());

        // Only the generic check applies to .rs files.
        let report = set.validate("fn main() {\n", "main.rs").unwrap();
        assert!(!report.has_errors());

        assert!(ValidatorSet::new().validate("{", "x.json").is_none());
    }
}
