//! Sandboxed terminal assistant runtime for the xAI Grok chat completions API.
//!
//! `grok-rs` holds everything behind the `grok` binary that is not terminal
//! glue: the wire types and HTTP client, the compact session notation and its
//! compressor, the sandbox guard that every path goes through, the
//! confirmation-gated file tools, the conversation loop
//! ([`Harness`](agent::harness::Harness)), the on-disk response cache and the
//! three-agent heavy fan-out.
//!
//! ```ignore
//! use grok_rs::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let client = XaiClient::from_env()?;
//!     let sandbox = Arc::new(Sandbox::new(".").map_err(|e| e.to_string())?);
//!     let gate = Arc::new(ConfirmGate::new(Arc::new(AutoConfirm), true));
//!     let files = Arc::new(FileTools::new(sandbox, gate, Arc::new(ValidatorSet::builtin())));
//!     let tools = ToolSet::new().with_file_tools(files);
//!
//!     let config = HarnessConfig::new("grok-4-1-fast-non-reasoning", "You are Grok.");
//!     let result = Harness::new(&client, &tools, config)
//!         .with_event_handler(&LoggingHandler)
//!         .run(vec![Message::user("List the files here.")])
//!         .await?;
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Harness`](agent::harness::Harness) loop, config, events, sessions, heavy fan-out |
//! | [`api`] | Retry with backoff, SSE streaming, model aliases, response cache |
//! | [`context`] | Compact notation codec and session compressor |
//! | [`sandbox`] | Launch-directory boundary guard |
//! | [`tools`] | [`Tool`](tools::core::Tool) trait, [`ToolSet`](tools::core::ToolSet), file tools, confirmation, validation |
//! | [`plugins`] | Compile-time plugin command registry |
//! | [`logging`] | Console tracing layer |

pub mod agent;
pub mod api;
pub mod context;
pub mod logging;
pub mod persist;
pub mod plugins;
pub mod prelude;
pub mod sandbox;
pub mod tools;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

pub const XAI_URL: &str = "https://api.x.ai/v1/chat/completions";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "XAI_API_KEY";

/// Default model for conversation turns.
pub const DEFAULT_MODEL: &str = "grok-4-1-fast-non-reasoning";

/// Reported on every model call made without a credential.
pub const MISSING_KEY_MESSAGE: &str = "XAI_API_KEY not set. Get your key from console.x.ai and: export XAI_API_KEY=your_key_here";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. This is the bridge between strong Rust types
/// and the `serde_json::Value` that the function-calling API expects.
///
/// # Example
///
/// ```
/// use grok_rs::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct ReadArgs {
///     path: String,
/// }
///
/// let schema = json_schema_for::<ReadArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"path".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    /// Text content, or the empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call returned by the model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionCallData {
    pub name: String,
    pub arguments: String,
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from a [`ChatBackend`] call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletion {
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<UsageInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// A text-only completion.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

/// Token usage statistics.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl UsageInfo {
    pub fn total(&self) -> u32 {
        self.total_tokens.unwrap_or_else(|| {
            self.prompt_tokens.unwrap_or(0) + self.completion_tokens.unwrap_or(0)
        })
    }
}

// ── Backend trait ──────────────────────────────────────────────────

/// Boxed future returned by [`ChatBackend`] methods.
pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<ChatCompletion, String>> + Send + 'a>>;

/// Callback receiving streamed text deltas.
pub type DeltaCallback<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// The model capability consumed by the harness and heavy mode.
pub trait ChatBackend: Send + Sync {
    /// Send a request and wait for the whole response.
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a>;

    /// Send a request, passing text deltas to `on_delta` as they arrive.
    /// Backends without streaming answer in one piece.
    fn chat_stream<'a>(
        &'a self,
        body: &'a ChatRequest,
        on_delta: DeltaCallback<'a>,
    ) -> ChatFuture<'a> {
        Box::pin(async move {
            let completion = self.chat(body).await?;
            if let Some(text) = completion.content.as_deref() {
                on_delta(text);
            }
            Ok(completion)
        })
    }
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the xAI chat completions API.
pub struct XaiClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) url: String,
}

impl XaiClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("grok-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: XAI_URL.to_string(),
        })
    }

    /// Create a client from `XAI_API_KEY`. A missing key is not an error
    /// here; every call reports it instead.
    pub fn from_env() -> Result<Self, String> {
        Self::new(std::env::var(API_KEY_ENV).unwrap_or_default())
    }

    /// Point the client at a different endpoint.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub(crate) fn require_key(&self) -> Result<(), String> {
        if self.has_api_key() {
            Ok(())
        } else {
            Err(MISSING_KEY_MESSAGE.to_string())
        }
    }

    /// Send a chat completion request.
    pub async fn complete(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        self.require_key()?;
        let tool_count = body.tools.as_ref().map_or(0, |t| t.len());
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={}, temp={}",
            body.model,
            body.messages.len(),
            tool_count,
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        let elapsed = start.elapsed();
        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            elapsed.as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("xAI API HTTP {status}: {text}"));
        }

        parse_completion(&text)
    }
}

/// Parse a non-streaming response body.
pub(crate) fn parse_completion(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("xAI API error: {}", err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    match parsed.choices.and_then(|c| c.into_iter().next()) {
        Some(c) => {
            let tool_calls = c.message.tool_calls.unwrap_or_default();
            debug!(
                "LLM output: {} chars text, {} tool call(s)",
                c.message.content.as_ref().map_or(0, |s| s.len()),
                tool_calls.len()
            );
            Ok(ChatCompletion {
                content: c.message.content,
                tool_calls,
                usage: parsed.usage,
                finish_reason: c.finish_reason,
            })
        }
        None => {
            debug!("LLM output: empty (no choices)");
            Ok(ChatCompletion {
                usage: parsed.usage,
                ..Default::default()
            })
        }
    }
}

impl ChatBackend for XaiClient {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a> {
        Box::pin(self.complete(body))
    }

    fn chat_stream<'a>(
        &'a self,
        body: &'a ChatRequest,
        on_delta: DeltaCallback<'a>,
    ) -> ChatFuture<'a> {
        Box::pin(self.complete_streaming(body, on_delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content.as_deref(), Some("hello"));

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);

        let assist = Message::assistant_text("prefill");
        assert_eq!(assist.role, MessageRole::Assistant);
        assert_eq!(assist.text(), "prefill");

        let tool = Message::tool_result("call-1", "result");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn chat_request_skips_unset_fields() {
        let req = ChatRequest {
            model: "grok-4".into(),
            messages: vec![Message::user("hi")],
            max_tokens: 100,
            temperature: 0.5,
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("stream").is_none());
        assert_eq!(json["model"], "grok-4");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn parses_text_response() {
        let body = r#"{
            "choices": [{"message": {"content": "Hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13}
        }"#;
        let completion = parse_completion(body).unwrap();
        assert_eq!(completion.content.as_deref(), Some("Hi there"));
        assert!(completion.tool_calls.is_empty());
        assert_eq!(completion.usage.unwrap().total(), 13);
    }

    #[test]
    fn parses_tool_call_response() {
        let body = r#"{"choices": [{"message": {"content": null, "tool_calls": [
            {"id": "call_1", "type": "function",
             "function": {"name": "read_file", "arguments": "{\"path\":\"a.txt\"}"}}
        ]}, "finish_reason": "tool_calls"}]}"#;
        let completion = parse_completion(body).unwrap();
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].function.name, "read_file");
    }

    #[test]
    fn api_error_body_is_reported() {
        let err = parse_completion(r#"{"error": {"message": "bad key"}}"#).unwrap_err();
        assert_eq!(err, "xAI API error: bad key");
    }

    #[test]
    fn usage_total_falls_back_to_sum() {
        let usage = UsageInfo {
            prompt_tokens: Some(4),
            completion_tokens: Some(6),
            total_tokens: None,
        };
        assert_eq!(usage.total(), 10);
    }

    #[tokio::test]
    async fn missing_key_reported_per_call() {
        let client = XaiClient::new("").unwrap();
        assert!(!client.has_api_key());
        let req = ChatRequest {
            model: DEFAULT_MODEL.into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let err = client.complete(&req).await.unwrap_err();
        assert_eq!(err, MISSING_KEY_MESSAGE);
    }

    #[test]
    fn completion_serializes_for_cache() {
        let completion = ChatCompletion::text("cached");
        let json = serde_json::to_string(&completion).unwrap();
        assert!(!json.contains("tool_calls"));
        let back: ChatCompletion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, completion);
    }
}
