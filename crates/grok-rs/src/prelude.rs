//! Convenience re-exports for common `grok-rs` types.
//!
//! ```ignore
//! use grok_rs::prelude::*;
//! ```
//!
//! Pulls in the client, [`Message`] constructors, [`Harness`] and config,
//! the [`Tool`] trait and [`ToolSet`], the sandbox and file tools, event
//! handlers and the session types. Streaming events, cache internals and
//! validator implementations are left to their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    ChatBackend, ChatCompletion, ChatRequest, DEFAULT_MODEL, Message, MessageRole, ToolCall,
    ToolDef, XaiClient, json_schema_for,
};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    CompositeEventHandler, Conversation, EventHandler, FnEventHandler, Harness, HarnessConfig,
    HarnessEvent, HarnessResult, HeavyConfig, LoggingHandler, NoopHandler, SessionStore,
    run_heavy,
};

// ── API helpers ─────────────────────────────────────────────────────
pub use crate::api::{ResponseCache, RetryConfig, resolve_model_name};

// ── Context ─────────────────────────────────────────────────────────
pub use crate::context::{CompressionMode, Record, Value};

// ── Sandbox and tools ───────────────────────────────────────────────
pub use crate::sandbox::Sandbox;
pub use crate::tools::{
    AutoConfirm, ConfirmGate, Confirmer, Decision, FileTools, Tool, ToolFuture, ToolSet,
    ValidatorSet, parse_tool_args,
};

// ── Plugins ─────────────────────────────────────────────────────────
pub use crate::plugins::{Plugin, PluginCommand, PluginRegistry};
