//! Configuration types for the [`Harness`](super::harness::Harness).
//!
//! ```ignore
//! let config = HarnessConfig::new("grok-4-1-fast-non-reasoning", "You are Grok.")
//!     .with_max_rounds(10)
//!     .with_max_tokens(8192)
//!     .with_temperature(0.7)
//!     .with_streaming(true)
//!     .with_cache(Arc::new(ResponseCache::new(cache_dir)));
//! ```

use crate::api::cache::ResponseCache;
use crate::api::retry::RetryConfig;
use std::sync::Arc;

/// Default round-trip cap.
pub const DEFAULT_MAX_ROUNDS: u32 = 10;

/// Default completion budget per call.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Configuration for a [`Harness`](super::harness::Harness) run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// API model identifier (e.g. `"grok-4-1-fast-non-reasoning"`).
    pub model: String,
    /// System prompt prepended when the conversation has none.
    pub system_prompt: Option<String>,
    /// Maximum model round-trips before giving up.
    pub max_rounds: u32,
    /// Maximum tokens per LLM response.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether to stream responses (emits `TextDelta` events).
    pub streaming: bool,
    /// Retry configuration for transient API failures.
    pub retry: RetryConfig,
    /// Response cache consulted for tool-free completions.
    pub cache: Option<Arc<ResponseCache>>,
}

impl HarnessConfig {
    /// Create a config with a model and system prompt.
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: Some(system_prompt.into()),
            ..Default::default()
        }
    }

    /// Set the maximum number of model round-trips.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Set the maximum tokens per LLM response.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the retry count for transient API failures. `0` disables retries.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry = RetryConfig::with_retries(max_retries);
        self
    }

    /// Replace the whole retry configuration.
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable streaming for LLM API calls.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Use a response cache.
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Switch models, keeping everything else.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            model: crate::DEFAULT_MODEL.to_string(),
            system_prompt: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            streaming: false,
            retry: RetryConfig::default(),
            cache: None,
        }
    }
}
