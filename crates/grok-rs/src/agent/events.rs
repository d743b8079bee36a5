//! Events, handlers, and run results for the [`Harness`](super::harness::Harness).
//!
//! The harness reports progress through [`HarnessEvent`] variants covering a
//! run from round start through tool execution to completion. Callers
//! implement [`EventHandler`] to observe them for logging, terminal
//! rendering or metrics.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use crate::Message;
use tracing::{debug, info, trace, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the harness during a run.
#[derive(Debug)]
pub enum HarnessEvent<'a> {
    /// A new round is starting.
    RoundStart {
        round: u32,
        max_rounds: u32,
        message_count: usize,
    },
    /// The LLM returned text (may be alongside tool calls).
    Text(&'a str),
    /// Incremental text content delta (streaming mode only).
    TextDelta(&'a str),
    /// The LLM is requesting tool calls this round.
    ToolCallsReceived { round: u32, count: usize },
    /// A single tool is about to be executed.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A single tool finished executing.
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        result: &'a str,
    },
    /// Token usage reported by the API for this round.
    TokenUsage {
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// The response was served from the response cache.
    CacheHit { model: &'a str },
    /// A transient API failure is about to be retried.
    Retrying {
        attempt: u32,
        max_retries: u32,
        delay_ms: u64,
        error: &'a str,
    },
    /// The model produced its final answer.
    Finished,
    /// The round cap was hit before a final answer.
    RoundLimitReached { max_rounds: u32 },
}

impl HarnessEvent<'_> {
    /// Total tokens of a `TokenUsage` event.
    pub fn total_tokens(&self) -> Option<u64> {
        if let HarnessEvent::TokenUsage {
            prompt_tokens,
            completion_tokens,
        } = self
        {
            Some(*prompt_tokens as u64 + *completion_tokens as u64)
        } else {
            None
        }
    }
}

/// Handler for harness events.
pub trait EventHandler: Send + Sync {
    /// Called for each event during the harness run.
    fn on_event(&self, event: &HarnessEvent<'_>) {
        let _ = event;
    }
}

/// A handler that ignores every event.
pub struct NoopHandler;

impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let HarnessEvent::TextDelta(text) = event {
///         print!("{text}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&HarnessEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &HarnessEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to multiple inner handlers in
/// registration order.
///
/// ```ignore
/// let handler = CompositeEventHandler::new()
///     .with(LoggingHandler)
///     .with(terminal_handler);
/// ```
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &HarnessEvent<'_>) {
        match event {
            HarnessEvent::RoundStart {
                round,
                max_rounds,
                message_count,
            } => {
                info!("[round {round}/{max_rounds}] {message_count} messages");
            }
            HarnessEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "LLM text: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            HarnessEvent::TextDelta(delta) => {
                let preview: String = delta.chars().take(80).collect();
                trace!("Stream text delta: {preview}");
            }
            HarnessEvent::ToolCallsReceived { round, count } => {
                debug!("{count} tool call(s) in round {round}");
            }
            HarnessEvent::ToolExecuting { name, .. } => {
                debug!("Executing tool: {name}");
            }
            HarnessEvent::ToolResult { name, result, .. } => {
                debug!("Tool {name} result: {} bytes", result.len());
            }
            HarnessEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
            } => {
                debug!("Tokens: prompt={prompt_tokens}, completion={completion_tokens}");
            }
            HarnessEvent::CacheHit { model } => {
                debug!("Response cache hit for {model}");
            }
            HarnessEvent::Retrying {
                attempt,
                max_retries,
                delay_ms,
                error,
            } => {
                warn!("API call failed ({error}), retry {attempt}/{max_retries} in {delay_ms}ms");
            }
            HarnessEvent::Finished => {
                info!("Agent finished (no more tool calls)");
            }
            HarnessEvent::RoundLimitReached { max_rounds } => {
                info!("Agent hit round limit ({max_rounds})");
            }
        }
    }
}

// ── Run result ─────────────────────────────────────────────────────

/// The result of a complete [`Harness::run()`](super::harness::Harness::run).
#[derive(Debug, Clone)]
pub struct HarnessResult {
    /// Final answer (or the round-limit notice).
    pub text: String,
    /// All messages exchanged during the run, including the initial ones.
    pub messages: Vec<Message>,
    /// Number of model round-trips made.
    pub rounds_used: u32,
    /// Whether the model finished on its own (vs hitting the round limit).
    pub finished: bool,
    /// Total prompt tokens consumed across all rounds.
    pub prompt_tokens: u32,
    /// Total completion tokens consumed across all rounds.
    pub completion_tokens: u32,
}

impl HarnessResult {
    /// Total tokens (prompt + completion).
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}
