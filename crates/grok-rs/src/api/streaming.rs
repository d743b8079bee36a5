//! Server-Sent Events (SSE) streaming for the chat completions API.
//!
//! Provides [`StreamEvent`], the incremental [`SseDecoder`] and the
//! [`XaiClient::complete_streaming`] method, which hands text deltas to a
//! callback as they arrive and assembles the full [`ChatCompletion`] once the
//! stream ends.

use crate::{ChatCompletion, ChatRequest, DeltaCallback, ToolCall, UsageInfo, XaiClient};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// A single event from an SSE stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// An incremental text content delta.
    TextDelta(String),
    /// An incremental reasoning delta (reasoning models only).
    ReasoningDelta(String),
    /// A tool call chunk (accumulated until complete).
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments_delta: String,
    },
    /// Token usage information (sent in the final chunk).
    Usage(UsageInfo),
    /// The choice finished with this reason.
    Finish(String),
    /// The stream is complete.
    Done,
}

/// Raw SSE data chunk.
#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
    #[serde(alias = "reasoning")]
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

#[derive(Deserialize, Debug)]
struct StreamToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<StreamFunctionDelta>,
}

#[derive(Deserialize, Debug)]
struct StreamFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

// ── Decoder ────────────────────────────────────────────────────────

/// Line-buffering SSE decoder. Bytes may be split anywhere; complete
/// `data:` lines are turned into events.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `data: [DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw text and return the events completed by it.
    pub fn feed(&mut self, text: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        self.buffer.push_str(text);

        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            let line = line.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if line == "data: [DONE]" {
                events.push(StreamEvent::Done);
                self.done = true;
                self.buffer.clear();
                break;
            }
            if let Some(data) = line.strip_prefix("data:") {
                parse_sse_data(data.trim_start(), &mut events);
            }
        }
        events
    }

    /// Flush an unterminated final line and close the stream.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        let remaining = std::mem::take(&mut self.buffer);
        let remaining = remaining.trim();
        if remaining != "data: [DONE]"
            && let Some(data) = remaining.strip_prefix("data:")
        {
            parse_sse_data(data.trim_start(), &mut events);
        }
        events.push(StreamEvent::Done);
        self.done = true;
        events
    }
}

impl XaiClient {
    /// Send a chat completion request with SSE streaming, invoking
    /// `on_delta` for each text delta as it arrives off the wire.
    pub async fn complete_streaming(
        &self,
        body: &ChatRequest,
        on_delta: DeltaCallback<'_>,
    ) -> Result<ChatCompletion, String> {
        self.require_key()?;
        let mut stream_body = body.clone();
        stream_body.stream = Some(true);

        debug!(
            "Sending streaming chat request: model={}, messages={}",
            body.model,
            body.messages.len()
        );

        let mut resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&stream_body)
            .send()
            .await
            .map_err(|e| format!("streaming request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(format!("xAI API HTTP {status}: {text}"));
        }

        // Read incrementally via chunk() so long responses (e.g. file-write
        // tool calls) don't hit a single-body timeout.
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| format!("failed to read streaming chunk: {e}"))?
        {
            for ev in decoder.feed(&String::from_utf8_lossy(&chunk)) {
                if let StreamEvent::TextDelta(ref text) = ev {
                    on_delta(text);
                }
                events.push(ev);
            }
            if decoder.is_done() {
                break;
            }
        }
        for ev in decoder.finish() {
            if let StreamEvent::TextDelta(ref text) = ev {
                on_delta(text);
            }
            events.push(ev);
        }

        debug!("Stream completed with {} events", events.len());
        Ok(assemble_completion(&events))
    }
}

/// Parse a single SSE `data:` payload into stream events.
fn parse_sse_data(data: &str, events: &mut Vec<StreamEvent>) {
    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e}; data: {data}");
            return;
        }
    };

    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage(usage));
    }

    for choice in chunk.choices.unwrap_or_default() {
        if let Some(delta) = choice.delta {
            if let Some(content) = delta.content
                && !content.is_empty()
            {
                events.push(StreamEvent::TextDelta(content));
            }
            if let Some(reasoning) = delta.reasoning_content
                && !reasoning.is_empty()
            {
                events.push(StreamEvent::ReasoningDelta(reasoning));
            }
            for tc in delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = match tc.function {
                    Some(f) => (f.name, f.arguments.unwrap_or_default()),
                    None => (None, String::new()),
                };
                events.push(StreamEvent::ToolCallDelta {
                    index: tc.index.unwrap_or(0),
                    id: tc.id,
                    name,
                    arguments_delta: arguments,
                });
            }
        }
        if let Some(reason) = choice.finish_reason {
            trace!("Stream finish_reason: {reason}");
            events.push(StreamEvent::Finish(reason));
        }
    }
}

/// Assemble a complete text string from a sequence of stream events.
pub fn collect_text(events: &[StreamEvent]) -> String {
    let mut text = String::new();
    for event in events {
        if let StreamEvent::TextDelta(delta) = event {
            text.push_str(delta);
        }
    }
    text
}

/// Extract usage info from stream events (if present).
pub fn extract_usage(events: &[StreamEvent]) -> Option<UsageInfo> {
    events.iter().rev().find_map(|event| match event {
        StreamEvent::Usage(usage) => Some(usage.clone()),
        _ => None,
    })
}

/// Merge tool-call fragments by index into complete calls.
pub fn collect_tool_calls(events: &[StreamEvent]) -> Vec<ToolCall> {
    let mut partial: BTreeMap<usize, (String, String, String)> = BTreeMap::new();
    for event in events {
        if let StreamEvent::ToolCallDelta {
            index,
            id,
            name,
            arguments_delta,
        } = event
        {
            let entry = partial.entry(*index).or_default();
            if let Some(id) = id {
                entry.0.clone_from(id);
            }
            if let Some(name) = name {
                entry.1.push_str(name);
            }
            entry.2.push_str(arguments_delta);
        }
    }
    partial
        .into_iter()
        .map(|(index, (id, name, args))| {
            let id = if id.is_empty() {
                format!("call_{index}")
            } else {
                id
            };
            ToolCall::function(id, name, args)
        })
        .collect()
}

/// Build the final completion from a whole stream.
pub fn assemble_completion(events: &[StreamEvent]) -> ChatCompletion {
    let text = collect_text(events);
    let finish_reason = events.iter().rev().find_map(|e| match e {
        StreamEvent::Finish(reason) => Some(reason.clone()),
        _ => None,
    });
    ChatCompletion {
        content: (!text.is_empty()).then_some(text),
        tool_calls: collect_tool_calls(events),
        usage: extract_usage(events),
        finish_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_text_from_deltas() {
        let events = vec![
            StreamEvent::TextDelta("Hello ".into()),
            StreamEvent::TextDelta("world!".into()),
            StreamEvent::Done,
        ];
        assert_eq!(collect_text(&events), "Hello world!");
    }

    #[test]
    fn extract_usage_from_events() {
        let events = vec![
            StreamEvent::TextDelta("hi".into()),
            StreamEvent::Usage(UsageInfo {
                prompt_tokens: Some(100),
                completion_tokens: Some(50),
                total_tokens: Some(150),
            }),
            StreamEvent::Done,
        ];
        let usage = extract_usage(&events).unwrap();
        assert_eq!(usage.prompt_tokens, Some(100));
    }

    #[test]
    fn extract_usage_returns_none_when_missing() {
        let events = vec![StreamEvent::TextDelta("hi".into()), StreamEvent::Done];
        assert!(extract_usage(&events).is_none());
    }

    #[test]
    fn decoder_handles_split_lines() {
        let mut decoder = SseDecoder::new();
        let first = decoder.feed("data: {\"choices\":[{\"delta\":{\"con");
        assert!(first.is_empty());
        let second = decoder.feed("tent\":\"Hi\"}}]}\n\n: keep-alive\n");
        assert_eq!(second, vec![StreamEvent::TextDelta("Hi".into())]);
        let third = decoder.feed("data: [DONE]\n");
        assert_eq!(third, vec![StreamEvent::Done]);
        assert!(decoder.is_done());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn decoder_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(
            decoder
                .feed("data: {\"choices\":[{\"delta\":{\"content\":\"end\"}}]}")
                .is_empty()
        );
        let events = decoder.finish();
        assert_eq!(
            events,
            vec![StreamEvent::TextDelta("end".into()), StreamEvent::Done]
        );
    }

    #[test]
    fn malformed_chunk_is_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed("data: {not json}\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n");
        assert_eq!(events, vec![StreamEvent::TextDelta("ok".into())]);
    }

    #[test]
    fn tool_call_fragments_are_assembled() {
        let mut decoder = SseDecoder::new();
        let mut events = decoder.feed(concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"read_file\",\"arguments\":\"{\\\"pa\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"th\\\":\\\"x\\\"}\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n",
            "data: [DONE]\n",
        ));
        events.extend(decoder.finish());
        let completion = assemble_completion(&events);
        assert_eq!(completion.content, None);
        assert_eq!(completion.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].id, "call_a");
        assert_eq!(completion.tool_calls[0].function.name, "read_file");
        assert_eq!(completion.tool_calls[0].function.arguments, "{\"path\":\"x\"}");
    }

    #[test]
    fn reasoning_deltas_are_not_text() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"hmm\",\"content\":\"A\"}}]}\n",
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("A".into()),
                StreamEvent::ReasoningDelta("hmm".into())
            ]
        );
        assert_eq!(collect_text(&events), "A");
    }
}
