//! Request dispatch, tool execution and retry helpers.
//!
//! These functions are called by [`super::harness::Harness::run()`] to handle
//! the per-round mechanics: sending API requests (through the response cache
//! when one is configured), executing tool calls in order and retrying
//! transient failures.

use super::config::HarnessConfig;
use super::events::{EventHandler, HarnessEvent};
use crate::api::retry::{self, RetryConfig};
use crate::tools::core::ToolSet;
use crate::{ChatBackend, ChatCompletion, ChatRequest, Message, ToolCall, ToolDef};
use tracing::{debug, warn};

// ── Send request ──────────────────────────────────────────────────

/// Build the request for a round.
pub(crate) fn build_request(
    config: &HarnessConfig,
    messages: &[Message],
    tool_defs: &[ToolDef],
) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: messages.to_vec(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        tools: (!tool_defs.is_empty()).then(|| tool_defs.to_vec()),
        stream: None,
    }
}

/// Send a round's request, handling the cache and streaming vs non-streaming.
///
/// Only tool-free completions are written to the cache, so a hit never
/// skips a tool call.
pub(crate) async fn send_round_request(
    config: &HarnessConfig,
    backend: &dyn ChatBackend,
    body: &ChatRequest,
    event_handler: &dyn EventHandler,
) -> Result<ChatCompletion, String> {
    if let Some(cache) = config.cache.as_deref()
        && let Some(hit) = cache.get(body)
    {
        event_handler.on_event(&HarnessEvent::CacheHit { model: &body.model });
        if let Some(text) = hit.content.as_deref()
            && config.streaming
        {
            event_handler.on_event(&HarnessEvent::TextDelta(text));
        }
        return Ok(hit);
    }

    let completion = if config.streaming {
        let on_delta = |delta: &str| {
            event_handler.on_event(&HarnessEvent::TextDelta(delta));
        };
        retry_api_call(&config.retry, event_handler, || {
            backend.chat_stream(body, &on_delta)
        })
        .await?
    } else {
        retry_api_call(&config.retry, event_handler, || backend.chat(body)).await?
    };

    if let Some(cache) = config.cache.as_deref()
        && completion.tool_calls.is_empty()
        && completion.content.as_deref().is_some_and(|c| !c.is_empty())
        && let Err(e) = cache.put(body, &completion)
    {
        warn!("Failed to cache response: {e}");
    }

    Ok(completion)
}

// ── Tool execution ────────────────────────────────────────────────

/// Execute tool calls one at a time, in the order the model gave them.
/// Later calls may depend on earlier ones' side effects, and confirmation
/// prompts must appear one at a time. Returns one `tool` message per call.
pub(crate) async fn execute_tool_calls(
    tools: &ToolSet,
    event_handler: &dyn EventHandler,
    tool_calls: &[ToolCall],
) -> Vec<Message> {
    let mut results = Vec::with_capacity(tool_calls.len());
    for call in tool_calls {
        event_handler.on_event(&HarnessEvent::ToolExecuting {
            name: &call.function.name,
            arguments: &call.function.arguments,
        });
        let result = tools
            .execute(&call.function.name, &call.function.arguments)
            .await;
        event_handler.on_event(&HarnessEvent::ToolResult {
            name: &call.function.name,
            call_id: &call.id,
            result: &result,
        });
        results.push(Message::tool_result(&call.id, result));
    }
    results
}

// ── Retry ─────────────────────────────────────────────────────────

/// Run `call`, retrying transient failures with backoff. Permanent errors
/// and exhausted retries return the last error.
pub async fn retry_api_call<T, F, Fut>(
    config: &RetryConfig,
    event_handler: &dyn EventHandler,
    mut call: F,
) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, String>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt < config.max_retries && retry::is_transient_error(&e) {
                    let delay = config.delay_for_attempt(attempt);
                    event_handler.on_event(&HarnessEvent::Retrying {
                        attempt: attempt + 1,
                        max_retries: config.max_retries,
                        delay_ms: delay.as_millis() as u64,
                        error: &e,
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                } else {
                    debug!("API call failed after {attempt} retries: {e}");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::NoopHandler;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_api_call(&fast_retry(3), &NoopHandler, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("xAI API HTTP 429 Too Many Requests: slow down".to_string())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_api_call(&fast_retry(3), &NoopHandler, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("xAI API HTTP 401 Unauthorized: bad key".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_api_call(&fast_retry(2), &NoopHandler, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("xAI API HTTP 503 Service Unavailable: busy".to_string()) }
        })
        .await;
        assert!(result.unwrap_err().contains("503"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn request_omits_empty_tools() {
        let config = HarnessConfig::new("grok-4", "sys");
        let body = build_request(&config, &[Message::user("hi")], &[]);
        assert!(body.tools.is_none());
        assert_eq!(body.max_tokens, 8192);
    }
}
