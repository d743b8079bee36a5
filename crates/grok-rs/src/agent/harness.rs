//! Agent harness: the tool-use conversation loop.
//!
//! The [`Harness`] sends messages plus tool definitions to the model,
//! executes any returned tool calls through the [`ToolSet`], appends the
//! results as `tool` messages, and repeats until the model answers without
//! tool calls or the round cap is hit. Callers observe the loop via
//! [`EventHandler`] events.

use super::config::HarnessConfig;
use super::events::{EventHandler, HarnessEvent, HarnessResult, NoopHandler};
use super::execution::{build_request, execute_tool_calls, send_round_request};
use crate::tools::core::ToolSet;
use crate::{ChatBackend, Message, MessageRole};
use tracing::info;

/// Final text when the round cap is hit.
pub const ROUND_LIMIT_MESSAGE: &str = "I encountered too many steps. Please try a simpler request.";

// ── Harness ────────────────────────────────────────────────────────

/// The tool-use loop.
///
/// ```ignore
/// let client = XaiClient::from_env()?;
/// let tools = ToolSet::new().with_file_tools(files);
/// let config = HarnessConfig::new(DEFAULT_MODEL, system_prompt);
///
/// let result = Harness::new(&client, &tools, config)
///     .with_event_handler(&LoggingHandler)
///     .run(vec![Message::user("Create hello.py")])
///     .await?;
/// println!("{}", result.text);
/// ```
///
/// `Harness<'a>` borrows the backend, tools and event handler; bind them
/// to `let` bindings before building the harness so they outlive `.run()`.
pub struct Harness<'a> {
    backend: &'a dyn ChatBackend,
    tools: &'a ToolSet,
    config: HarnessConfig,
    event_handler: &'a dyn EventHandler,
}

impl<'a> Harness<'a> {
    /// Create a new harness with the given backend, tools, and config.
    pub fn new(backend: &'a dyn ChatBackend, tools: &'a ToolSet, config: HarnessConfig) -> Self {
        Self {
            backend,
            tools,
            config,
            event_handler: &NoopHandler,
        }
    }

    /// Attach an event handler.
    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run the loop to completion.
    ///
    /// When `messages` has no system message and the config carries a
    /// system prompt, it is prepended. Model transport errors (after
    /// retries) abort the run; tool failures never do.
    pub async fn run(self, mut messages: Vec<Message>) -> Result<HarnessResult, String> {
        if let Some(ref prompt) = self.config.system_prompt
            && !messages.iter().any(|m| m.role == MessageRole::System)
        {
            messages.insert(0, Message::system(prompt));
        }

        info!(
            "Harness run started: model={}, messages={}, tools={}",
            self.config.model,
            messages.len(),
            self.tools.len()
        );

        let tool_defs = self.tools.definitions();
        let mut prompt_tokens = 0u32;
        let mut completion_tokens = 0u32;

        for round in 1..=self.config.max_rounds {
            self.event_handler.on_event(&HarnessEvent::RoundStart {
                round,
                max_rounds: self.config.max_rounds,
                message_count: messages.len(),
            });

            let body = build_request(&self.config, &messages, &tool_defs);
            let completion =
                send_round_request(&self.config, self.backend, &body, self.event_handler).await?;

            if let Some(ref u) = completion.usage {
                let pt = u.prompt_tokens.unwrap_or(0);
                let ct = u.completion_tokens.unwrap_or(0);
                prompt_tokens += pt;
                completion_tokens += ct;
                self.event_handler.on_event(&HarnessEvent::TokenUsage {
                    prompt_tokens: pt,
                    completion_tokens: ct,
                });
            }

            if let Some(ref text) = completion.content
                && !text.is_empty()
            {
                self.event_handler.on_event(&HarnessEvent::Text(text));
            }

            if completion.tool_calls.is_empty() {
                let text = completion.content.unwrap_or_default();
                messages.push(Message::assistant_text(&text));
                self.event_handler.on_event(&HarnessEvent::Finished);
                info!("Harness run finished after {round} round(s)");
                return Ok(HarnessResult {
                    text,
                    messages,
                    rounds_used: round,
                    finished: true,
                    prompt_tokens,
                    completion_tokens,
                });
            }

            self.event_handler.on_event(&HarnessEvent::ToolCallsReceived {
                round,
                count: completion.tool_calls.len(),
            });
            messages.push(Message::assistant_tool_calls(
                completion.content.clone(),
                completion.tool_calls.clone(),
            ));
            let results =
                execute_tool_calls(self.tools, self.event_handler, &completion.tool_calls).await;
            messages.extend(results);
        }

        self.event_handler.on_event(&HarnessEvent::RoundLimitReached {
            max_rounds: self.config.max_rounds,
        });
        info!("Harness run stopped at round limit ({})", self.config.max_rounds);
        Ok(HarnessResult {
            text: ROUND_LIMIT_MESSAGE.to_string(),
            messages,
            rounds_used: self.config.max_rounds,
            finished: false,
            prompt_tokens,
            completion_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::FnEventHandler;
    use crate::agent::test_support::ScriptedBackend;
    use crate::api::cache::ResponseCache;
    use crate::sandbox::Sandbox;
    use crate::tools::confirm::ConfirmGate;
    use crate::tools::files::FileTools;
    use crate::tools::validate::ValidatorSet;
    use crate::{ChatCompletion, ToolCall, UsageInfo};
    use std::sync::{Arc, Mutex};

    struct Workspace {
        _dir: tempfile::TempDir,
        root: std::path::PathBuf,
        tools: ToolSet,
    }

    fn workspace() -> Workspace {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(Sandbox::new(dir.path()).unwrap());
        let root = sandbox.root().to_path_buf();
        let files = Arc::new(FileTools::new(
            sandbox,
            Arc::new(ConfirmGate::auto()),
            Arc::new(ValidatorSet::new()),
        ));
        Workspace {
            _dir: dir,
            root,
            tools: ToolSet::new().with_file_tools(files),
        }
    }

    fn config() -> HarnessConfig {
        HarnessConfig::new("grok-test", "You are a test.").with_retries(0)
    }

    fn tool_completion(calls: Vec<ToolCall>) -> ChatCompletion {
        ChatCompletion {
            tool_calls: calls,
            usage: Some(UsageInfo {
                prompt_tokens: Some(10),
                completion_tokens: Some(2),
                total_tokens: Some(12),
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn text_only_response_finishes_in_one_round() {
        let ws = workspace();
        let backend = ScriptedBackend::new(vec![Ok(ChatCompletion::text("Hello!"))]);
        let result = Harness::new(&backend, &ws.tools, config())
            .run(vec![Message::user("hi")])
            .await
            .unwrap();

        assert!(result.finished);
        assert_eq!(result.rounds_used, 1);
        assert_eq!(result.text, "Hello!");
        assert_eq!(result.messages[0].role, MessageRole::System);
        assert_eq!(result.messages.last().unwrap().text(), "Hello!");

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tools.as_ref().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn tool_calls_run_in_order_and_feed_back() {
        let ws = workspace();
        let backend = ScriptedBackend::new(vec![
            Ok(tool_completion(vec![
                ToolCall::function(
                    "c1",
                    "write_file",
                    r#"{"path": "notes.txt", "content": "abcabc"}"#,
                ),
                ToolCall::function(
                    "c2",
                    "edit_file",
                    r#"{"path": "notes.txt", "old_text": "abc", "new_text": "X"}"#,
                ),
            ])),
            Ok(ChatCompletion::text("Done.")),
        ]);

        let result = Harness::new(&backend, &ws.tools, config())
            .run(vec![Message::user("make notes")])
            .await
            .unwrap();

        assert!(result.finished);
        assert_eq!(result.rounds_used, 2);
        assert_eq!(result.prompt_tokens, 10);
        assert_eq!(
            std::fs::read_to_string(ws.root.join("notes.txt")).unwrap(),
            "XX"
        );

        let tool_msgs: Vec<&Message> = result
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .collect();
        assert_eq!(tool_msgs.len(), 2);
        assert_eq!(tool_msgs[0].tool_call_id.as_deref(), Some("c1"));
        assert!(tool_msgs[0].text().starts_with("Successfully wrote 6 bytes"));
        assert!(tool_msgs[1].text().contains("(2 replacement(s))"));

        // Second request carries the assistant tool-call turn and results.
        let second = &backend.requests()[1];
        assert_eq!(second.messages.len(), 5);
    }

    #[tokio::test]
    async fn tool_errors_are_fed_back_not_raised() {
        let ws = workspace();
        let backend = ScriptedBackend::new(vec![
            Ok(tool_completion(vec![ToolCall::function(
                "c1",
                "read_file",
                r#"{"path": "missing.txt"}"#,
            )])),
            Ok(tool_completion(vec![ToolCall::function(
                "c2",
                "read_file",
                "not json at all",
            )])),
            Ok(ChatCompletion::text("Sorry.")),
        ]);

        let result = Harness::new(&backend, &ws.tools, config())
            .run(vec![Message::user("read it")])
            .await
            .unwrap();
        assert!(result.finished);
        let tool_texts: Vec<&str> = result
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Tool)
            .map(|m| m.text())
            .collect();
        assert_eq!(tool_texts[0], "Error: File not found: missing.txt");
        assert!(tool_texts[1].starts_with("Error: "));
    }

    #[tokio::test]
    async fn round_limit_yields_canned_message() {
        let ws = workspace();
        let responses = (0..3)
            .map(|i| {
                Ok(tool_completion(vec![ToolCall::function(
                    format!("c{i}"),
                    "list_files",
                    "{}",
                )]))
            })
            .collect();
        let backend = ScriptedBackend::new(responses);

        let limit_hit = Arc::new(Mutex::new(false));
        let flag = limit_hit.clone();
        let handler = FnEventHandler::new(move |event| {
            if let HarnessEvent::RoundLimitReached { max_rounds } = event {
                assert_eq!(*max_rounds, 3);
                *flag.lock().unwrap() = true;
            }
        });

        let result = Harness::new(&backend, &ws.tools, config().with_max_rounds(3))
            .with_event_handler(&handler)
            .run(vec![Message::user("loop forever")])
            .await
            .unwrap();

        assert!(!result.finished);
        assert_eq!(result.rounds_used, 3);
        assert_eq!(result.text, ROUND_LIMIT_MESSAGE);
        assert!(*limit_hit.lock().unwrap());
        assert_eq!(backend.requests().len(), 3);
    }

    #[tokio::test]
    async fn transport_error_aborts_run() {
        let ws = workspace();
        let backend = ScriptedBackend::new(vec![Err("xAI API HTTP 401: nope".to_string())]);
        let err = Harness::new(&backend, &ws.tools, config())
            .run(vec![Message::user("hi")])
            .await
            .unwrap_err();
        assert!(err.contains("401"));
    }

    #[tokio::test]
    async fn existing_system_message_is_kept() {
        let ws = workspace();
        let backend = ScriptedBackend::new(vec![Ok(ChatCompletion::text("ok"))]);
        Harness::new(&backend, &ws.tools, config())
            .run(vec![Message::system("custom"), Message::user("hi")])
            .await
            .unwrap();
        let request = &backend.requests()[0];
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].text(), "custom");
    }

    #[tokio::test]
    async fn streaming_emits_deltas() {
        let ws = workspace();
        let backend = ScriptedBackend::new(vec![Ok(ChatCompletion::text("streamed"))]);
        let deltas = Arc::new(Mutex::new(String::new()));
        let sink = deltas.clone();
        let handler = FnEventHandler::new(move |event| {
            if let HarnessEvent::TextDelta(d) = event {
                sink.lock().unwrap().push_str(d);
            }
        });
        Harness::new(&backend, &ws.tools, config().with_streaming(true))
            .with_event_handler(&handler)
            .run(vec![Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(*deltas.lock().unwrap(), "streamed");
    }

    #[tokio::test]
    async fn cache_serves_repeated_text_completion() {
        let ws = workspace();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ResponseCache::new(cache_dir.path()));
        let backend = ScriptedBackend::new(vec![Ok(ChatCompletion::text("cached answer"))]);
        let cfg = config().with_cache(cache.clone());

        let first = Harness::new(&backend, &ws.tools, cfg.clone())
            .run(vec![Message::user("same question")])
            .await
            .unwrap();
        let second = Harness::new(&backend, &ws.tools, cfg)
            .run(vec![Message::user("same question")])
            .await
            .unwrap();

        assert_eq!(first.text, "cached answer");
        assert_eq!(second.text, "cached answer");
        assert_eq!(backend.requests().len(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[tokio::test]
    async fn tool_call_responses_are_not_cached() {
        let ws = workspace();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ResponseCache::new(cache_dir.path()));
        let backend = ScriptedBackend::new(vec![
            Ok(tool_completion(vec![ToolCall::function("c1", "list_files", "{}")])),
            Ok(ChatCompletion::text("listed")),
        ]);
        Harness::new(&backend, &ws.tools, config().with_cache(cache.clone()))
            .run(vec![Message::user("list")])
            .await
            .unwrap();
        assert_eq!(cache.stats().file_count, 1);
    }
}
