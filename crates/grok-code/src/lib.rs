//! Grok CLI: a terminal assistant for xAI Grok models built on grok-rs.
//!
//! The binary wires the pieces together; the modules are public so the
//! REPL can be driven from tests or embedded elsewhere.
//!
//! - [`config`] loads `~/.grok/config.toml` and turns it, with CLI flags,
//!   into harness and tool-set settings.
//! - [`repl`] dispatches input lines: slash commands, shell-like commands,
//!   heavy mode, `create` and `edit`, plugin commands and model turns.
//! - [`input`] owns stdin and hands lines to the REPL and the prompts.
//! - [`confirm`] prompts on the terminal before files are changed.
//! - [`shell`] implements file commands such as `ls`, `cd` and `cp` inside
//!   the sandbox.
//! - [`generate`] names and cleans files produced by `create` and `edit`.
//! - [`plugins`] holds the plugins compiled into the binary.
//!
//! ```sh
//! grok                      # interactive REPL
//! grok ask "what is a monad"
//! grok heavy "write a fast LRU cache"
//! grok resume --list
//! ```

pub mod config;
pub mod confirm;
pub mod generate;
pub mod input;
pub mod plugins;
pub mod prompt;
pub mod repl;
pub mod shell;

pub use config::{GrokConfig, GrokPaths, RunOptions};
pub use confirm::TerminalConfirmer;
pub use input::Lines;
pub use prompt::{ASK_PROMPT, system_prompt};
pub use repl::{Flow, Repl};
