//! Model aliases.
//!
//! Users pick models by short alias (`grok41_fast`); the API wants the full
//! identifier (`grok-4-1-fast-non-reasoning`). Either form is accepted
//! wherever a model name is taken.

/// Alias, API identifier, description. Order is the display order.
const MODELS: &[(&str, &str, &str)] = &[
    (
        "grok41_fast",
        "grok-4-1-fast-non-reasoning",
        "Default fast model (non-reasoning, cheapest)",
    ),
    (
        "grok41_heavy",
        "grok-4-1-fast-reasoning",
        "Heavy reasoning model (parallel agents)",
    ),
    (
        "grok4_fast",
        "grok-4-fast-non-reasoning",
        "Grok 4 fast (non-reasoning)",
    ),
    (
        "grok4_reasoning",
        "grok-4-fast-reasoning",
        "Grok 4 with reasoning",
    ),
    ("grok_code", "grok-code-fast-1", "Code-optimized model"),
    ("grok4", "grok-4", "Grok 4 base model"),
    (
        "grok2_image",
        "grok-2-image-1212",
        "Image understanding model",
    ),
];

/// Alias used when nothing else is configured.
pub const DEFAULT_ALIAS: &str = "grok41_fast";

/// Model used by heavy mode regardless of configuration.
pub const HEAVY_MODEL: &str = "grok-4-1-fast-reasoning";

/// One row of the model table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: &'static str,
    pub api_model: &'static str,
    pub reasoning: bool,
    pub description: &'static str,
}

/// All known aliases, in display order.
pub fn aliases() -> impl Iterator<Item = &'static str> {
    MODELS.iter().map(|(alias, _, _)| *alias)
}

/// Resolve an alias or API identifier to the API identifier.
pub fn resolve_model_name(name: &str) -> Result<&'static str, String> {
    MODELS
        .iter()
        .find(|(alias, api, _)| *api == name || *alias == name)
        .map(|(_, api, _)| *api)
        .ok_or_else(|| {
            format!(
                "Unknown model: {name}\nAvailable models: {}\nOr use API model string directly",
                aliases().collect::<Vec<_>>().join(", ")
            )
        })
}

/// Alias for an API identifier, or the identifier itself when unmapped.
pub fn friendly_name(api_model: &str) -> &str {
    MODELS
        .iter()
        .find(|(_, api, _)| *api == api_model)
        .map_or(api_model, |(alias, _, _)| *alias)
}

/// Whether a model reasons before answering. Unknown names are treated
/// as their own identifier.
pub fn is_reasoning_model(model: &str) -> bool {
    let api = resolve_model_name(model).unwrap_or(model);
    api.contains("reasoning") && !api.contains("non-reasoning")
}

/// The model table.
pub fn list_models() -> Vec<ModelInfo> {
    MODELS
        .iter()
        .map(|(name, api_model, description)| ModelInfo {
            name,
            api_model,
            reasoning: is_reasoning_model(api_model),
            description,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_resolves_to_api_id() {
        assert_eq!(
            resolve_model_name("grok41_fast").unwrap(),
            "grok-4-1-fast-non-reasoning"
        );
        assert_eq!(resolve_model_name("grok_code").unwrap(), "grok-code-fast-1");
    }

    #[test]
    fn api_id_passes_through() {
        assert_eq!(resolve_model_name("grok-4").unwrap(), "grok-4");
    }

    #[test]
    fn unknown_model_lists_aliases() {
        let err = resolve_model_name("gpt-5").unwrap_err();
        assert!(err.starts_with("Unknown model: gpt-5\n"));
        assert!(err.contains("grok41_fast, grok41_heavy"));
    }

    #[test]
    fn friendly_name_round_trip() {
        assert_eq!(friendly_name("grok-4-1-fast-reasoning"), "grok41_heavy");
        assert_eq!(friendly_name("custom-model"), "custom-model");
    }

    #[test]
    fn reasoning_detection() {
        assert!(is_reasoning_model("grok41_heavy"));
        assert!(is_reasoning_model("grok-4-fast-reasoning"));
        assert!(!is_reasoning_model("grok41_fast"));
        assert!(!is_reasoning_model("grok4"));
    }

    #[test]
    fn table_is_complete() {
        let models = list_models();
        assert_eq!(models.len(), 7);
        assert_eq!(models[0].name, DEFAULT_ALIAS);
        assert_eq!(models.iter().filter(|m| m.reasoning).count(), 2);
        assert_eq!(resolve_model_name("grok41_heavy").unwrap(), HEAVY_MODEL);
    }
}
