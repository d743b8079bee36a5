//! User configuration and directory layout.
//!
//! [`GrokConfig`] is read from `~/.grok/config.toml` (created with commented
//! defaults on first run). CLI flags arrive as [`RunOptions`] and take
//! precedence. [`GrokConfig::build_harness_config`] and
//! [`GrokConfig::build_tool_set`] convert both into grok-rs types.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use grok_rs::agent::HarnessConfig;
use grok_rs::api::models::{DEFAULT_ALIAS, resolve_model_name};
use grok_rs::context::CompressionMode;
use grok_rs::persist::write_atomic;
use grok_rs::sandbox::Sandbox;
use grok_rs::tools::{ConfirmGate, Confirmer, FileTools, ToolSet, ValidatorSet};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Written on first run.
pub const DEFAULT_CONFIG_TOML: &str = r#"# Grok CLI Configuration
# This file is created automatically on first run

# Default model to use (grok41_fast | grok41_heavy)
default_model = "grok41_fast"

# Session compression mode: always | smart | never
# smart = compress only when >12k tokens (recommended)
auto_compress = "smart"

# Auto-confirm all prompts (use -y/--yes flag equivalent)
auto_yes = false

# Enable colored output
colour = true

# Lean mode: minimal comments in generated code
# Set to true or use GROK_LEAN=1 environment variable
lean_mode = false

# Monthly budget limit in USD (0 = disabled)
budget_monthly = 0.0

# Daily token quota for web plugin (0 = disabled)
web_daily_quota = 100000
"#;

/// Per-tool execution timeout.
const TOOL_TIMEOUT: Duration = Duration::from_secs(600);

// ── Paths ───────────────────────────────────────────────────────────

/// Global (`~/.grok`) and project (`<launch>/.grok`) directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrokPaths {
    pub global: PathBuf,
    pub project: PathBuf,
}

impl GrokPaths {
    pub fn new(home: impl AsRef<Path>, launch: impl AsRef<Path>) -> Self {
        Self {
            global: home.as_ref().join(".grok"),
            project: launch.as_ref().join(".grok"),
        }
    }

    /// Locate the home directory with `dirs`.
    pub fn discover(launch: impl AsRef<Path>) -> Result<Self, String> {
        let home = dirs::home_dir().ok_or("Cannot determine home directory")?;
        Ok(Self::new(home, launch))
    }

    pub fn config_file(&self) -> PathBuf {
        self.global.join("config.toml")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.global.join("cache")
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.global.join("plugins")
    }

    pub fn history_file(&self) -> PathBuf {
        self.global.join("history")
    }

    /// Create the global and project directories.
    pub fn ensure(&self) -> Result<(), String> {
        for dir in [
            self.global.clone(),
            self.cache_dir(),
            self.plugins_dir(),
            self.project.join("sessions"),
        ] {
            std::fs::create_dir_all(&dir)
                .map_err(|e| format!("Failed to create {}: {e}", dir.display()))?;
        }
        Ok(())
    }
}

// ── Config file ─────────────────────────────────────────────────────

/// Contents of `config.toml`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrokConfig {
    pub default_model: String,
    pub auto_compress: CompressionMode,
    pub auto_yes: bool,
    pub colour: bool,
    pub lean_mode: bool,
    pub budget_monthly: f64,
    pub web_daily_quota: u64,
}

impl Default for GrokConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_ALIAS.to_string(),
            auto_compress: CompressionMode::Smart,
            auto_yes: false,
            colour: true,
            lean_mode: false,
            budget_monthly: 0.0,
            web_daily_quota: 100_000,
        }
    }
}

impl GrokConfig {
    /// Load `path`, writing the default document first if it is missing.
    /// Returns the config and whether this was the first run.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool), String> {
        let first_run = !path.exists();
        if first_run {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create {}: {e}", parent.display()))?;
            }
            write_atomic(path, DEFAULT_CONFIG_TOML)
                .map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
            info!("Created default config at {}", path.display());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let config = Self::parse(&text)
            .map_err(|e| format!("Invalid config {}: {e}", path.display()))?;
        Ok((config, first_run))
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Environment overrides: `GROK_LEAN=1` forces lean mode.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if lookup("GROK_LEAN").as_deref() == Some("1") {
            self.lean_mode = true;
        }
        self
    }

    /// Write atomically. Comments of the original document are not kept.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let text = toml::to_string_pretty(self).map_err(|e| format!("Failed to encode config: {e}"))?;
        write_atomic(path, text).map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Harness settings for a turn: the model comes from the flag when set,
    /// else from the file.
    pub fn build_harness_config(
        &self,
        options: &RunOptions,
        system_prompt: impl Into<String>,
    ) -> Result<HarnessConfig, String> {
        let alias = options.model.as_deref().unwrap_or(&self.default_model);
        let model = resolve_model_name(alias)?;
        Ok(HarnessConfig::new(model, system_prompt)
            .with_max_rounds(options.max_rounds)
            .with_max_tokens(options.max_tokens)
            .with_temperature(options.temperature)
            .with_streaming(true))
    }

    /// File tools over `sandbox`, plus the tool set exposing them. The gate
    /// starts in auto-confirm when `-y` or `auto_yes` is set.
    pub fn build_tool_set(
        &self,
        options: &RunOptions,
        sandbox: Arc<Sandbox>,
        confirmer: Arc<dyn Confirmer>,
    ) -> (ToolSet, Arc<FileTools>) {
        let gate = Arc::new(ConfirmGate::new(confirmer, options.yes || self.auto_yes));
        let files = Arc::new(FileTools::new(
            sandbox,
            gate,
            Arc::new(ValidatorSet::builtin()),
        ));
        let tools = ToolSet::new()
            .with_file_tools(Arc::clone(&files))
            .with_arg_validation(true)
            .with_default_timeout(Some(TOOL_TIMEOUT));
        (tools, files)
    }

    /// Compression mode, flag first.
    pub fn compression(&self, options: &RunOptions) -> CompressionMode {
        options.compress.unwrap_or(self.auto_compress)
    }
}

// ── CLI overrides ───────────────────────────────────────────────────

/// Flag values that override the file.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub model: Option<String>,
    pub yes: bool,
    pub max_rounds: u32,
    pub max_tokens: u32,
    pub temperature: f32,
    pub no_cache: bool,
    pub compress: Option<CompressionMode>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            model: None,
            yes: false,
            max_rounds: grok_rs::agent::config::DEFAULT_MAX_ROUNDS,
            max_tokens: grok_rs::agent::config::DEFAULT_MAX_TOKENS,
            temperature: grok_rs::agent::config::DEFAULT_TEMPERATURE,
            no_cache: false,
            compress: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grok_rs::tools::AutoConfirm;

    #[test]
    fn default_document_parses_to_defaults() {
        assert_eq!(GrokConfig::parse(DEFAULT_CONFIG_TOML).unwrap(), GrokConfig::default());
    }

    #[test]
    fn missing_keys_take_defaults() {
        let config = GrokConfig::parse("auto_yes = true\nauto_compress = \"never\"\n").unwrap();
        assert!(config.auto_yes);
        assert_eq!(config.auto_compress, CompressionMode::Never);
        assert_eq!(config.default_model, "grok41_fast");
        assert_eq!(config.web_daily_quota, 100_000);
    }

    #[test]
    fn invalid_mode_is_an_error() {
        assert!(GrokConfig::parse("auto_compress = \"sometimes\"\n").is_err());
    }

    #[test]
    fn first_run_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let (config, first) = GrokConfig::load_or_create(&path).unwrap();
        assert!(first);
        assert!(path.exists());
        assert_eq!(config, GrokConfig::default());

        let (_, first) = GrokConfig::load_or_create(&path).unwrap();
        assert!(!first);
    }

    #[test]
    fn save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = GrokConfig {
            default_model: "grok4".into(),
            lean_mode: true,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let (loaded, first) = GrokConfig::load_or_create(&path).unwrap();
        assert!(!first);
        assert_eq!(loaded, config);
    }

    #[test]
    fn lean_env_override() {
        let config = GrokConfig::default().apply_env(|k| (k == "GROK_LEAN").then(|| "1".to_string()));
        assert!(config.lean_mode);
        let config = GrokConfig::default().apply_env(|_| Some("0".to_string()));
        assert!(!config.lean_mode);
    }

    #[test]
    fn harness_config_resolves_model() {
        let config = GrokConfig::default();
        let harness = config
            .build_harness_config(&RunOptions::default(), "sys")
            .unwrap();
        assert_eq!(harness.model, "grok-4-1-fast-non-reasoning");
        assert_eq!(harness.max_rounds, 10);
        assert!(harness.streaming);

        let options = RunOptions {
            model: Some("grok_code".into()),
            max_rounds: 3,
            ..Default::default()
        };
        let harness = config.build_harness_config(&options, "sys").unwrap();
        assert_eq!(harness.model, "grok-code-fast-1");
        assert_eq!(harness.max_rounds, 3);

        let options = RunOptions {
            model: Some("nope".into()),
            ..Default::default()
        };
        assert!(config.build_harness_config(&options, "sys").is_err());
    }

    #[test]
    fn tool_set_has_file_tools_and_gate_flag() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Arc::new(Sandbox::new(dir.path()).unwrap());
        let config = GrokConfig::default();
        let options = RunOptions {
            yes: true,
            ..Default::default()
        };
        let (tools, files) = config.build_tool_set(&options, sandbox, Arc::new(AutoConfirm));
        let mut names = tools.names();
        names.sort();
        assert_eq!(names, vec!["edit_file", "list_files", "read_file", "write_file"]);
        assert!(files.gate().auto_confirm());
    }

    #[test]
    fn compression_flag_wins() {
        let config = GrokConfig::default();
        assert_eq!(config.compression(&RunOptions::default()), CompressionMode::Smart);
        let options = RunOptions {
            compress: Some(CompressionMode::Always),
            ..Default::default()
        };
        assert_eq!(config.compression(&options), CompressionMode::Always);
    }

    #[test]
    fn paths_layout() {
        let paths = GrokPaths::new("/home/u", "/work/proj");
        assert_eq!(paths.config_file(), PathBuf::from("/home/u/.grok/config.toml"));
        assert_eq!(paths.cache_dir(), PathBuf::from("/home/u/.grok/cache"));
        assert_eq!(paths.project, PathBuf::from("/work/proj/.grok"));
    }
}
