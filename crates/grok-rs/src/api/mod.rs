//! API interaction layer: retry, streaming, model aliases and response caching.
//!
//! These modules handle everything between the
//! [`Harness`](crate::agent::harness::Harness) loop and the xAI API:
//!
//! - [`retry`]: transient error detection (429, 5xx, network failures) with
//!   exponential backoff and jitter. Never retries 400/401 errors.
//! - [`streaming`]: SSE decoder for incremental text and tool-call deltas.
//! - [`models`]: alias table (`grok41_fast` and friends) and reasoning
//!   model detection.
//! - [`cache`]: SHA-256 keyed on-disk cache of completions with age and
//!   size pruning.

pub mod cache;
pub mod models;
pub mod retry;
pub mod streaming;

// Re-export commonly used items at the module level.
pub use cache::{CacheStats, ResponseCache};
pub use models::{friendly_name, is_reasoning_model, list_models, resolve_model_name};
pub use retry::RetryConfig;
