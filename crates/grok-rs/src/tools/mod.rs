//! Tool abstractions and the sandboxed file tools.
//!
//! Every capability the model can invoke is a [`Tool`] implementor. Tools are
//! collected into a [`ToolSet`] which handles dispatch, argument validation,
//! truncation and timeouts.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`] trait, [`ToolSet`], [`ToolError`] and the
//!   string conversion at the tool-result boundary.
//! - [`files`]: `read_file`, `write_file`, `edit_file`, `list_files` on
//!   top of [`FileTools`]. Register all four with
//!   [`ToolSet::with_file_tools()`].
//! - [`confirm`]: [`ConfirmGate`] and the [`Confirmer`] trait that every
//!   mutation passes through.
//! - [`validate`]: per-extension content validators.
//! - [`diff`]: unified diff previews.
//! - [`names`]: tool name constants.

pub mod confirm;
pub mod core;
pub mod diff;
pub mod files;
pub mod names;
pub mod validate;

pub use confirm::{
    AutoConfirm, ConfirmAction, ConfirmFuture, ConfirmGate, ConfirmRequest, Confirmer, Decision,
    FnConfirmer, RejectAll,
};
pub use core::{
    DEFAULT_MAX_RESULT_BYTES, Tool, ToolError, ToolErrorKind, ToolFuture, ToolOutcome, ToolSet,
    parse_tool_args, truncate_result, validate_tool_arguments,
};
pub use files::FileTools;
pub use validate::{ValidationReport, Validator, ValidatorSet};
