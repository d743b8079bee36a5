//! Canonical tool name constants.

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const EDIT_FILE: &str = "edit_file";
pub const LIST_FILES: &str = "list_files";

/// All file tools, in the order they are described to the model.
pub const FILE_TOOLS: [&str; 4] = [READ_FILE, WRITE_FILE, EDIT_FILE, LIST_FILES];
