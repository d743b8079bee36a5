//! File naming and output cleanup for the `create` and `edit` commands.

/// File types `create` accepts, with the extension each one gets.
const EXTENSIONS: [(&str, &str); 29] = [
    ("py", "py"),
    ("python", "py"),
    ("js", "js"),
    ("javascript", "js"),
    ("ts", "ts"),
    ("typescript", "ts"),
    ("html", "html"),
    ("css", "css"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yml"),
    ("toml", "toml"),
    ("md", "md"),
    ("markdown", "md"),
    ("txt", "txt"),
    ("sh", "sh"),
    ("bash", "sh"),
    ("sql", "sql"),
    ("rs", "rs"),
    ("rust", "rs"),
    ("go", "go"),
    ("java", "java"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("h", "h"),
    ("hpp", "hpp"),
    ("rb", "rb"),
    ("ruby", "rb"),
    ("kt", "kt"),
];

/// Words never used in a suggested filename.
const STOP_WORDS: [&str; 13] = [
    "a", "an", "the", "for", "to", "with", "in", "on", "at", "by", "from", "that", "this",
];

/// Whether `create` knows `file_type`.
pub fn known_type(file_type: &str) -> bool {
    EXTENSIONS.iter().any(|(name, _)| *name == file_type)
}

/// Extension for `file_type`; unknown types are used as given.
pub fn extension(file_type: &str) -> &str {
    EXTENSIONS
        .iter()
        .find(|(name, _)| *name == file_type)
        .map_or(file_type, |(_, ext)| *ext)
}

/// Build a filename from the first meaningful words of `description`:
/// three when there are that many, else up to two, else `file`.
pub fn suggest_filename(file_type: &str, description: &str) -> String {
    let lower = description.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .collect();
    let keep = if words.len() >= 3 { 3 } else { 2 };
    let stem = if words.is_empty() {
        "file".to_string()
    } else {
        words[..keep.min(words.len())].join("_")
    };
    format!("{stem}.{}", extension(file_type))
}

/// Strip a surrounding markdown fence from model output. The result ends
/// with a newline unless it is empty.
pub fn strip_fences(content: &str) -> String {
    let content = content.trim();
    let body = if content.starts_with("```") {
        let mut lines: Vec<&str> = content.lines().skip(1).collect();
        if lines.last().is_some_and(|l| l.trim() == "```") {
            lines.pop();
        }
        lines.join("\n")
    } else {
        content.to_string()
    };
    if body.is_empty() || body.ends_with('\n') {
        body
    } else {
        body + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_map_to_extensions() {
        assert!(known_type("python"));
        assert!(!known_type("a"));
        assert_eq!(extension("python"), "py");
        assert_eq!(extension("bash"), "sh");
        assert_eq!(extension("yml"), "yml");
        assert_eq!(extension("zig"), "zig");
    }

    #[test]
    fn filenames_from_descriptions() {
        assert_eq!(
            suggest_filename("py", "binary search algorithm for sorted lists"),
            "binary_search_algorithm.py"
        );
        assert_eq!(suggest_filename("rust", "an LRU cache"), "lru_cache.rs");
        assert_eq!(suggest_filename("js", "the parser"), "parser.js");
        assert_eq!(suggest_filename("md", "to do it"), "file.md");
    }

    #[test]
    fn fences_are_removed() {
        assert_eq!(strip_fences("```python\nprint('hi')\n```"), "print('hi')\n");
        assert_eq!(strip_fences("```\nx\n"), "x\n");
        assert_eq!(strip_fences("  plain text  "), "plain text\n");
        assert_eq!(strip_fences(""), "");
    }
}
