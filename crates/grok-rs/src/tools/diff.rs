//! Diff and preview rendering for confirmation prompts.

use similar::{ChangeTag, TextDiff};

/// New files longer than this many lines are previewed partially.
pub const LARGE_FILE_THRESHOLD: usize = 100;

/// Lines of unchanged context around each hunk.
pub const CONTEXT_LINES: usize = 3;

/// Line counts of a change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
}

/// Render a unified diff of `old` → `new` with `---`/`+++` headers and
/// `@@` hunk markers. Empty when the texts are identical.
pub fn unified_diff(old: &str, new: &str, label: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let groups = diff.grouped_ops(CONTEXT_LINES);
    if groups.is_empty() {
        return String::new();
    }

    let mut out = format!("--- a/{label}\n+++ b/{label}\n");
    for group in groups {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old_start = first.old_range().start;
        let old_len = last.old_range().end - old_start;
        let new_start = first.new_range().start;
        let new_len = last.new_range().end - new_start;
        out.push_str(&format!(
            "@@ -{},{old_len} +{},{new_len} @@\n",
            old_start + 1,
            new_start + 1
        ));

        for op in &group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => '-',
                    ChangeTag::Insert => '+',
                    ChangeTag::Equal => ' ',
                };
                let line = change.value();
                out.push(sign);
                out.push_str(line.strip_suffix('\n').unwrap_or(line));
                out.push('\n');
            }
        }
    }
    out
}

/// Count added and removed lines.
pub fn diff_stats(old: &str, new: &str) -> DiffStats {
    let diff = TextDiff::from_lines(old, new);
    let mut stats = DiffStats::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.added += 1,
            ChangeTag::Delete => stats.removed += 1,
            ChangeTag::Equal => {}
        }
    }
    stats
}

/// Preview of a file about to be created: the whole content, or the first
/// [`LARGE_FILE_THRESHOLD`] lines followed by `... (N more lines)`.
pub fn new_file_preview(content: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.len() <= LARGE_FILE_THRESHOLD {
        return content.to_string();
    }
    let mut preview = lines[..LARGE_FILE_THRESHOLD].join("\n");
    preview.push_str(&format!(
        "\n... ({} more lines)",
        lines.len() - LARGE_FILE_THRESHOLD
    ));
    preview
}
