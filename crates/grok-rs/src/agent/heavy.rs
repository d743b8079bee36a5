//! Heavy mode: three role-prompted opinions plus a coordinator.
//!
//! The task goes to a coder, a reviewer and an optimizer concurrently (each
//! a task in one [`JoinSet`]). Once all three have answered, a fourth call
//! asks a coordinator to merge them into one output. Any failed opinion fails
//! the whole run and aborts the other tasks, as does dropping the run.

use super::events::LoggingHandler;
use super::execution::retry_api_call;
use crate::api::cache::ResponseCache;
use crate::api::models::HEAVY_MODEL;
use crate::api::retry::RetryConfig;
use crate::context::toon::{self, Record};
use crate::{ChatBackend, ChatCompletion, ChatRequest, Message};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// The fixed expert roles, in prompt order.
pub const AGENT_ROLES: [(&str, &str); 3] = [
    (
        "coder",
        "Pure coder – output only perfect code, no explanation",
    ),
    (
        "reviewer",
        "Security & correctness reviewer – focus on bugs, edge cases, tests",
    ),
    (
        "optimizer",
        "Performance & style optimizer – focus on speed, readability, idioms",
    ),
];

/// System prompt of the merging call.
pub const COORDINATOR_PROMPT: &str = "You are the final coordinator. You have 3 expert opinions. \
Produce ONE unified, perfect output. \
If they conflict, choose the most correct/safe. \
If code, output the best version with inline comments explaining choices.";

/// Settings for a heavy run.
#[derive(Debug, Clone)]
pub struct HeavyConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub retry: RetryConfig,
    /// Consulted for every call, including the coordinator.
    pub cache: Option<Arc<ResponseCache>>,
}

impl Default for HeavyConfig {
    fn default() -> Self {
        Self {
            model: HEAVY_MODEL.to_string(),
            max_tokens: 8192,
            temperature: 0.7,
            retry: RetryConfig::default(),
            cache: None,
        }
    }
}

impl HeavyConfig {
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// One expert's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Opinion {
    pub role: &'static str,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct HeavyResult {
    /// The coordinator's merged output.
    pub answer: String,
    /// Expert answers in [`AGENT_ROLES`] order.
    pub opinions: Vec<Opinion>,
    /// Tokens of the coordinator call alone.
    pub coordinator_tokens: u32,
    /// Tokens across all four calls, as far as the API reported them.
    pub total_tokens: u32,
}

/// Session prefix for the expert system prompts.
pub fn context_preamble(context: Option<&Record>) -> String {
    match context {
        Some(record) if !record.is_empty() => {
            format!("Context from session:\n{}\n\n", toon::encode(record))
        }
        _ => String::new(),
    }
}

/// User prompt of the coordinator call.
pub fn coordinator_prompt(task: &str, opinions: &[Opinion]) -> String {
    let joined: Vec<String> = opinions
        .iter()
        .map(|o| format!("AGENT {}: {}", o.role.to_uppercase(), o.text))
        .collect();
    format!("Original task: {task}\n\n{}", joined.join("\n\n"))
}

/// Run the three experts concurrently, then the coordinator.
pub async fn run_heavy(
    backend: Arc<dyn ChatBackend>,
    task: &str,
    context: Option<&Record>,
    config: &HeavyConfig,
) -> Result<HeavyResult, String> {
    let started = Instant::now();
    let preamble = context_preamble(context);
    info!(model = %config.model, "Heavy mode: 3 agents + coordinator");

    // Dropping the set aborts every expert still in flight.
    let mut experts: JoinSet<(usize, Result<(Opinion, u32), String>)> = JoinSet::new();
    for (idx, &(role, description)) in AGENT_ROLES.iter().enumerate() {
        let body = request(
            config,
            vec![
                Message::system(format!("{preamble}You are {description}.")),
                Message::user(task),
            ],
        );
        let backend = Arc::clone(&backend);
        let cache = config.cache.clone();
        let retry = config.retry.clone();
        experts.spawn(async move {
            let answer = ask(backend.as_ref(), &body, cache.as_deref(), &retry)
                .await
                .map(|completion| {
                    let text = completion.content.clone().unwrap_or_default();
                    debug!("Agent {}: {} chars", role.to_uppercase(), text.chars().count());
                    (Opinion { role, text }, usage_total(&completion))
                });
            (idx, answer)
        });
    }

    let mut slots: Vec<Option<(Opinion, u32)>> = vec![None; AGENT_ROLES.len()];
    while let Some(joined) = experts.join_next().await {
        let outcome = match joined {
            Ok((idx, Ok(answer))) => {
                slots[idx] = Some(answer);
                continue;
            }
            Ok((_, Err(e))) => e,
            Err(e) => format!("Heavy agent task failed: {e}"),
        };
        experts.abort_all();
        warn!("Heavy mode failed: {outcome}");
        return Err(outcome);
    }
    let answers: Vec<(Opinion, u32)> = slots.into_iter().flatten().collect();

    let mut total_tokens: u32 = answers.iter().map(|(_, tokens)| tokens).sum();
    let opinions: Vec<Opinion> = answers.into_iter().map(|(opinion, _)| opinion).collect();

    let body = request(
        config,
        vec![
            Message::system(COORDINATOR_PROMPT),
            Message::user(coordinator_prompt(task, &opinions)),
        ],
    );
    let merged = ask(backend.as_ref(), &body, config.cache.as_deref(), &config.retry).await?;
    let coordinator_tokens = usage_total(&merged);
    total_tokens += coordinator_tokens;

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        total_tokens, "Heavy mode finished"
    );

    Ok(HeavyResult {
        answer: merged.content.unwrap_or_default(),
        opinions,
        coordinator_tokens,
        total_tokens,
    })
}

fn request(config: &HeavyConfig, messages: Vec<Message>) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages,
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        tools: None,
        stream: None,
    }
}

fn usage_total(completion: &ChatCompletion) -> u32 {
    completion.usage.as_ref().map(|u| u.total()).unwrap_or(0)
}

/// One cached, retried call.
async fn ask(
    backend: &dyn ChatBackend,
    body: &ChatRequest,
    cache: Option<&ResponseCache>,
    retry: &RetryConfig,
) -> Result<ChatCompletion, String> {
    if let Some(hit) = cache.and_then(|c| c.get(body)) {
        debug!("Heavy call served from cache");
        return Ok(hit);
    }
    let completion = retry_api_call(retry, &LoggingHandler, || backend.chat(body)).await?;
    if let Some(cache) = cache
        && completion.content.as_deref().is_some_and(|c| !c.is_empty())
        && let Err(e) = cache.put(body, &completion)
    {
        warn!("Failed to cache response: {e}");
    }
    Ok(completion)
}
