//! Interactive loop: dispatches each input line to a slash command, a
//! shell-like command, heavy mode, a plugin command, or a model turn.
//!
//! [`Repl::handle_line`] is the single entry point and never fails; errors
//! are printed and the loop continues. [`Repl::run`] reads its [`Lines`]
//! until they end or an exit command. Ctrl-C abandons the line in flight
//! and rejects any confirmation prompt it was waiting on.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use grok_rs::agent::{
    CompositeEventHandler, Conversation, EventHandler, Harness, HarnessEvent, HeavyConfig,
    LoggingHandler, SessionStore, run_heavy,
};
use grok_rs::api::models::{friendly_name, list_models, resolve_model_name};
use grok_rs::api::{CacheStats, ResponseCache};
use grok_rs::context::{CompressionMode, compressor};
use grok_rs::plugins::PluginRegistry;
use grok_rs::tools::{FileTools, ToolSet};
use grok_rs::{ChatBackend, Message, MessageRole};
use tracing::{debug, warn};

use crate::config::{GrokConfig, GrokPaths, RunOptions};
use crate::generate;
use crate::input::Lines;
use crate::prompt::{create_prompt, edit_prompt, edit_request, system_prompt};
use crate::shell;

/// Characters of a turn shown by `/history`.
const HISTORY_PREVIEW_CHARS: usize = 100;

/// Whether the loop keeps going after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

// ── Output ──────────────────────────────────────────────────────────

/// Writer shared between the REPL and the streaming renderer.
#[derive(Clone)]
pub struct Output(Arc<Mutex<Box<dyn Write + Send>>>);

impl Output {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(writer))))
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    fn line(&self, text: &str) {
        let mut out = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn chunk(&self, text: &str) {
        let mut out = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let _ = write!(out, "{text}");
        let _ = out.flush();
    }
}

/// Prints streamed text as it arrives and tool activity on stderr.
struct TerminalRenderer {
    out: Output,
}

impl EventHandler for TerminalRenderer {
    fn on_event(&self, event: &HarnessEvent) {
        match event {
            HarnessEvent::TextDelta(delta) => self.out.chunk(delta),
            HarnessEvent::ToolExecuting { name, .. } => eprintln!("  [tool] {name}"),
            HarnessEvent::Retrying {
                attempt,
                max_retries,
                delay_ms,
                ..
            } => eprintln!("  retrying ({attempt}/{max_retries}) in {delay_ms}ms"),
            _ => {}
        }
    }
}

// ── Reports ─────────────────────────────────────────────────────────

/// The `/models` table.
pub fn models_table() -> String {
    let mut out = format!("{:<14} {:<28} {:<10} {}\n", "Name", "API Model", "Type", "Description");
    for model in list_models() {
        let kind = if model.reasoning { "Reasoning" } else { "Fast" };
        out.push_str(&format!(
            "{:<14} {:<28} {:<10} {}\n",
            model.name, model.api_model, kind, model.description
        ));
    }
    out
}

/// Cache and session figures shown by `/cost` and `grok cache stats`.
pub fn cache_report(stats: &CacheStats, sessions: usize) -> String {
    format!(
        "Cached Responses  {}\nCache Size        {:.2} MB\nOldest Cache      {:.1} days\nSessions Saved    {sessions}",
        stats.file_count, stats.total_size_mb, stats.oldest_age_days
    )
}

fn help_text(topic: Option<&str>) -> String {
    match topic.map(str::to_lowercase).as_deref() {
        None => "\
Grok CLI - Natural Language Interface

Just type naturally. The assistant can read, write and edit files in
this project.

Slash Commands:
  /help [topic]     Show this help (topics: tools, slash, confirm)
  /model <name>     Switch to a different model
  /models           List available models
  /cost             Show token usage dashboard
  /clear            Clear conversation history
  /history          Show conversation history
  /y, /yes          Enable auto-confirm (skip file operation prompts)
  /n, /no           Disable auto-confirm (require prompts)
  /save             Save the session
  /compress         Show what compression would keep
  /plugins          List loaded plugins
  /pwd              Show current directory
  /exit, /quit      Exit the REPL

Shell Commands:
  ls, ll, cd, pwd, tree, cat, head, tail, mkdir, cp, mv, rm

Code Generation:
  create <type> <description>   Generate a new file
  edit <file> <instruction>     Rewrite an existing file

Heavy Mode:
  heavy <task>      Three experts and a coordinator

Configuration:
  Config: ~/.grok/config.toml
  API Key: export XAI_API_KEY=your_key"
            .to_string(),
        Some("tools") => "\
File Tools

The assistant can read, write, and edit files in your project.
Files are sandboxed to your project directory."
            .to_string(),
        Some("slash") => "\
Slash Commands

/help /h, /model /m, /models, /cost, /clear, /history, /yes /y, /no /n,
/pwd, /save, /compress, /plugins, /exit /quit"
            .to_string(),
        Some("confirm") => "\
Confirmation Mode

By default, file operations require confirmation.
  /y or /yes  - Enable auto-confirm (skip prompts)
  /n or /no   - Disable auto-confirm (require prompts)
Or set auto_yes = true in ~/.grok/config.toml"
            .to_string(),
        Some(other) => {
            format!("Unknown topic: {other}\nAvailable topics: tools, slash, confirm")
        }
    }
}

const CREATE_USAGE: &str = "Error: create requires <type> <description>\n\
Example: create py \"binary search algorithm\"";

const EDIT_USAGE: &str = "Error: edit requires <file> <instruction>\n\
Example: edit utils.py \"add type hints\"";

fn unquote(text: &str) -> String {
    text.trim().trim_matches(|c: char| c == '"' || c == '\'').to_string()
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(HISTORY_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

// ── Repl ────────────────────────────────────────────────────────────

/// Per-process token totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub heavy_tokens: u64,
    pub turns: u32,
}

pub struct Repl {
    backend: Arc<dyn ChatBackend>,
    tools: ToolSet,
    files: Arc<FileTools>,
    config: GrokConfig,
    options: RunOptions,
    paths: GrokPaths,
    cache: Option<Arc<ResponseCache>>,
    sessions: SessionStore,
    conversation: Conversation,
    plugins: PluginRegistry,
    usage: Usage,
    out: Output,
    lines: Lines,
}

impl Repl {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        tools: ToolSet,
        files: Arc<FileTools>,
        config: GrokConfig,
        options: RunOptions,
        paths: GrokPaths,
    ) -> Self {
        let sessions = SessionStore::new(&paths.project);
        Self {
            backend,
            tools,
            files,
            config,
            options,
            paths,
            cache: None,
            sessions,
            conversation: Conversation::new(),
            plugins: PluginRegistry::new(),
            usage: Usage::default(),
            out: Output::stdout(),
            lines: Lines::default(),
        }
    }

    pub fn with_cache(mut self, cache: Option<Arc<ResponseCache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn with_output(mut self, out: Output) -> Self {
        self.out = out;
        self
    }

    /// Where [`Repl::run`] reads lines from. Share it with the terminal
    /// confirmer so prompts and the loop never compete for stdin.
    pub fn with_input(mut self, lines: Lines) -> Self {
        self.lines = lines;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Model alias in effect: the flag if given, else the config file.
    pub fn model(&self) -> &str {
        self.options.model.as_deref().unwrap_or(&self.config.default_model)
    }

    fn say(&self, text: &str) {
        self.out.line(text);
    }

    /// Read lines until input ends or an exit command. The session is saved
    /// on the way out when anything was said.
    pub async fn run(mut self) {
        self.say("Entering REPL mode. Type 'exit' or 'quit' to leave, '/help' for commands.\n");
        loop {
            let cwd = self.files.sandbox().display_path(&self.files.sandbox().current_dir());
            self.out.chunk(&format!("grok [{}] {cwd}> ", self.model()));
            let Some(line) = self.lines.next().await else {
                break;
            };
            self.append_history(&line);

            let flow = tokio::select! {
                flow = self.handle_line(&line) => Some(flow),
                _ = tokio::signal::ctrl_c() => None,
            };
            match flow {
                Some(Flow::Exit) => break,
                Some(Flow::Continue) => {}
                None => {
                    self.files.gate().cancel_pending();
                    self.say("\nInterrupted. Use 'exit' or 'quit' to leave the REPL.");
                }
            }
        }
        if !self.conversation.is_empty() {
            self.save_session();
        }
        self.say("\nGoodbye!");
    }

    fn append_history(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let path = self.paths.history_file();
        let appended = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = appended {
            debug!("Failed to append to {}: {e}", path.display());
        }
    }

    /// Dispatch one input line.
    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }
        if matches!(line, "exit" | "quit") {
            return Flow::Exit;
        }
        if let Some(rest) = line.strip_prefix('/') {
            return self.slash(rest).await;
        }

        let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        let (command, args) = match words.split_first() {
            Some((command, args)) => (command.as_str(), args),
            None => return Flow::Continue,
        };

        if shell::is_shell_command(command) {
            match shell::run(&self.files, command, args).await {
                Ok(text) => self.say(&text),
                Err(e) => self.say(&format!("Error: {e}")),
            }
        } else if command == "create" && args.first().is_none_or(|t| generate::known_type(t)) {
            self.create(args).await;
        } else if command == "edit" && args.first().is_none_or(|f| self.is_existing_file(f)) {
            self.edit(args).await;
        } else if command == "heavy" {
            self.heavy(&args.join(" ")).await;
        } else if let Some(plugin_command) = self.plugins.command(command) {
            match plugin_command.run(args) {
                Ok(text) => self.say(&text),
                Err(e) => self.say(&format!("Error: {e}")),
            }
        } else {
            self.chat(line).await;
        }
        Flow::Continue
    }

    async fn slash(&mut self, rest: &str) -> Flow {
        let mut parts = rest.split_whitespace();
        let command = parts.next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = parts.collect();
        match command.as_str() {
            "help" | "h" => self.say(&help_text(args.first().copied())),
            "model" | "m" => self.switch_model(args.first().copied()),
            "models" => self.say(&models_table()),
            "cost" => self.cost(),
            "clear" => {
                self.conversation.clear();
                self.say("Conversation history cleared");
            }
            "history" => self.history(),
            "yes" | "y" => {
                self.files.gate().set_auto_confirm(true);
                self.say("Auto-confirm enabled (file operations will not prompt)");
            }
            "no" | "n" => {
                self.files.gate().set_auto_confirm(false);
                self.say("Auto-confirm disabled (file operations will prompt)");
            }
            "pwd" => self.say(&shell::pwd(&self.files)),
            "save" => self.save_session(),
            "compress" => self.compress_preview(),
            "plugins" => self.list_plugins(),
            "exit" | "quit" | "q" => return Flow::Exit,
            other => self.say(&format!(
                "Unknown command: /{other}\nType /help for available commands"
            )),
        }
        Flow::Continue
    }

    fn switch_model(&mut self, name: Option<&str>) {
        let Some(name) = name else {
            self.say(&format!(
                "Current model: {}\nUsage: /model <name> (use /models to list)",
                self.model()
            ));
            return;
        };
        let api_model = match resolve_model_name(name) {
            Ok(api) => api,
            Err(e) => {
                self.say(&format!("Error: {e}"));
                return;
            }
        };
        self.config.default_model = name.to_string();
        self.options.model = None;
        if let Err(e) = self.config.save(&self.paths.config_file()) {
            warn!("{e}");
        }
        self.say(&format!(
            "Model set to: {} ({api_model})",
            friendly_name(api_model)
        ));
    }

    fn cost(&self) {
        let stats = self
            .cache
            .as_ref()
            .map(|c| c.stats())
            .unwrap_or_default();
        let sessions = self.sessions.list().map(|s| s.len()).unwrap_or(0);
        let mut report = cache_report(&stats, sessions);
        report.push_str(&format!(
            "\nSession Tokens    {} prompt / {} completion over {} turn(s)",
            self.usage.prompt_tokens, self.usage.completion_tokens, self.usage.turns
        ));
        if self.usage.heavy_tokens > 0 {
            report.push_str(&format!("\nHeavy Mode Tokens {}", self.usage.heavy_tokens));
        }
        if let Some(cache) = &self.cache {
            report.push_str(&format!(
                "\nCache Hit Rate    {:.0}%",
                cache.hit_rate() * 100.0
            ));
        }
        if self.config.budget_monthly <= 0.0 {
            report.push_str("\n\nNote: Detailed cost tracking requires budget_monthly in config.toml");
        }
        self.say(&report);
    }

    fn history(&self) {
        let turns = self.conversation.turns();
        if turns.is_empty() {
            self.say("No conversation history");
            return;
        }
        let mut out = String::from("Conversation History:\n");
        for message in turns {
            let who = match message.role {
                MessageRole::User => "You",
                _ => "Grok",
            };
            out.push_str(&format!("{who}: {}\n", preview(message.text())));
        }
        out.push_str(&format!("({} messages)", turns.len()));
        self.say(&out);
    }

    fn save_session(&self) {
        let cwd = self.files.sandbox().current_dir();
        let record = self.conversation.snapshot(&cwd);
        match self.sessions.save(record, self.config.compression(&self.options)) {
            Ok(path) => self.say(&format!("Session saved: {}", path.display())),
            Err(e) => self.say(&format!("Error: {e}")),
        }
    }

    fn compress_preview(&self) {
        let cwd = self.files.sandbox().current_dir();
        let record = self.conversation.snapshot(&cwd);
        let before = compressor::estimate_record_tokens(&record);
        match compressor::compress(record, CompressionMode::Always) {
            Ok(compressed) => {
                let after = compressor::estimate_record_tokens(&compressed);
                self.say(&format!(
                    "Session context: {before} tokens, {after} after compression ({} keys kept)",
                    compressed.len()
                ));
            }
            Err(e) => self.say(&format!("Error: {e}")),
        }
    }

    fn list_plugins(&self) {
        let plugins = self.plugins.plugins();
        if plugins.is_empty() {
            self.say(&format!(
                "No plugins found in {}",
                self.paths.plugins_dir().display()
            ));
            return;
        }
        let mut out = format!("Loaded {} plugin(s):\n", plugins.len());
        for plugin in plugins {
            out.push_str(&format!("  {} - {}\n", plugin.name, plugin.description));
            for name in &plugin.commands {
                if let Some(command) = self.plugins.command(name) {
                    out.push_str(&format!("    {name} - {}\n", command.description));
                }
            }
        }
        self.say(out.trim_end());
    }

    async fn heavy(&mut self, task: &str) {
        if task.is_empty() {
            self.say("Error: heavy requires a task description");
            return;
        }
        let cwd = self.files.sandbox().current_dir();
        let context = (!self.conversation.is_empty()).then(|| self.conversation.snapshot(&cwd));
        let mut config = HeavyConfig::default();
        if let Some(cache) = &self.cache {
            config = config.with_cache(Arc::clone(cache));
        }
        match run_heavy(Arc::clone(&self.backend), task, context.as_ref(), &config).await {
            Ok(result) => {
                self.usage.heavy_tokens += u64::from(result.total_tokens);
                self.say(&result.answer);
                self.say(&format!("\nHeavy mode: {} tokens", result.total_tokens));
            }
            Err(e) => self.say(&format!("Error: {e}")),
        }
    }

    fn is_existing_file(&self, path: &str) -> bool {
        self.files
            .sandbox()
            .resolve_and_check(path, "edit")
            .is_ok_and(|p| p.is_file())
    }

    async fn create(&mut self, args: &[String]) {
        let [file_type, description @ ..] = args else {
            self.say(CREATE_USAGE);
            return;
        };
        let description = unquote(&description.join(" "));
        if description.is_empty() {
            self.say(CREATE_USAGE);
            return;
        }
        let filename = generate::suggest_filename(file_type, &description);
        self.say(&format!("Generating {filename}..."));

        let system = create_prompt(file_type, self.config.lean_mode);
        let request = format!("Create a {file_type} file that: {description}");
        let Some(content) = self.generate(system, request).await else {
            return;
        };
        match self.files.write(&filename, &content).await {
            Ok(text) => self.say(&text),
            Err(e) => self.say(&format!("Error: {}", e.message)),
        }
    }

    async fn edit(&mut self, args: &[String]) {
        let [path, instruction @ ..] = args else {
            self.say(EDIT_USAGE);
            return;
        };
        let instruction = unquote(&instruction.join(" "));
        if instruction.is_empty() {
            self.say(EDIT_USAGE);
            return;
        }
        let original = match self.files.read(path).await {
            Ok(text) => text,
            Err(e) => {
                self.say(&format!("Error: {}", e.message));
                return;
            }
        };
        let file_type = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("txt");

        let system = edit_prompt(file_type, self.config.lean_mode);
        let request = edit_request(&original, &instruction);
        let Some(content) = self.generate(system, request).await else {
            return;
        };
        match self.files.rewrite(path, &content).await {
            Ok(text) => self.say(&text),
            Err(e) => self.say(&format!("Error: {}", e.message)),
        }
    }

    /// A single tool-less model call outside the conversation. Returns the
    /// reply without markdown fences.
    async fn generate(&mut self, system: String, request: String) -> Option<String> {
        let mut harness_config = match self.config.build_harness_config(&self.options, system) {
            Ok(config) => config.with_streaming(false),
            Err(e) => {
                self.say(&format!("Error: {e}"));
                return None;
            }
        };
        if let Some(cache) = &self.cache {
            harness_config = harness_config.with_cache(Arc::clone(cache));
        }
        let tools = ToolSet::new();
        let result = Harness::new(self.backend.as_ref(), &tools, harness_config)
            .with_event_handler(&LoggingHandler)
            .run(vec![Message::user(request)])
            .await;
        match result {
            Ok(result) => {
                self.usage.prompt_tokens += u64::from(result.prompt_tokens);
                self.usage.completion_tokens += u64::from(result.completion_tokens);
                self.say(&format!("Tokens: {}", result.total_tokens()));
                Some(generate::strip_fences(&result.text))
            }
            Err(e) => {
                self.say(&format!("Error: {e}"));
                None
            }
        }
    }

    /// One natural-language turn through the harness.
    async fn chat(&mut self, text: &str) {
        let cwd = self.files.sandbox().current_dir();
        let prompt = system_prompt(&cwd, self.config.lean_mode);
        let mut harness_config = match self.config.build_harness_config(&self.options, prompt) {
            Ok(config) => config,
            Err(e) => {
                self.say(&format!("Error: {e}"));
                return;
            }
        };
        if let Some(cache) = &self.cache {
            harness_config = harness_config.with_cache(Arc::clone(cache));
        }

        self.conversation.push_user(text);
        let handler = CompositeEventHandler::new()
            .with(LoggingHandler)
            .with(TerminalRenderer {
                out: self.out.clone(),
            });
        let result = Harness::new(self.backend.as_ref(), &self.tools, harness_config)
            .with_event_handler(&handler)
            .run(self.conversation.turns().to_vec())
            .await;

        match result {
            Ok(result) => {
                if !result.finished {
                    self.out.chunk(&result.text);
                }
                self.say("");
                self.conversation.record_result(&result);
                self.usage.prompt_tokens += u64::from(result.prompt_tokens);
                self.usage.completion_tokens += u64::from(result.completion_tokens);
                self.usage.turns += 1;
                debug!(
                    rounds = result.rounds_used,
                    tokens = result.total_tokens(),
                    "Turn complete"
                );
            }
            Err(e) => self.say(&format!("\nError: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grok_rs::plugins::{Plugin, PluginCommand};
    use grok_rs::sandbox::Sandbox;
    use grok_rs::tools::AutoConfirm;
    use grok_rs::{ChatCompletion, ChatFuture, ChatRequest, ToolCall, UsageInfo};
    use std::collections::VecDeque;
    use std::path::Path;

    /// Replays canned completions and records requests.
    struct Scripted {
        responses: Mutex<VecDeque<ChatCompletion>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<ChatCompletion>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    impl ChatBackend for Scripted {
        fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a> {
            self.requests.lock().unwrap().push(body.clone());
            let next = self.responses.lock().unwrap().pop_front();
            Box::pin(async move { next.ok_or_else(|| "script exhausted".to_string()) })
        }
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn take(&self) -> String {
            String::from_utf8(std::mem::take(&mut *self.0.lock().unwrap())).unwrap()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Echo;

    impl Plugin for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo arguments"
        }

        fn commands(&self) -> Vec<PluginCommand> {
            vec![PluginCommand::new("echo", "Print arguments", |args| {
                Ok(args.join(" "))
            })]
        }
    }

    fn with_usage(mut completion: ChatCompletion) -> ChatCompletion {
        completion.usage = Some(UsageInfo {
            prompt_tokens: Some(10),
            completion_tokens: Some(5),
            total_tokens: Some(15),
        });
        completion
    }

    fn repl(dir: &Path, backend: Arc<Scripted>) -> (Repl, Captured) {
        let paths = GrokPaths::new(dir.join("home"), dir);
        paths.ensure().unwrap();
        let options = RunOptions {
            yes: true,
            ..Default::default()
        };
        let config = GrokConfig::default();
        let sandbox = Arc::new(Sandbox::new(dir).unwrap());
        let (tools, files) = config.build_tool_set(&options, sandbox, Arc::new(AutoConfirm));
        let captured = Captured::default();
        let repl = Repl::new(backend, tools, files, config, options, paths)
            .with_plugins(PluginRegistry::new().with(Echo))
            .with_output(Output::new(captured.clone()));
        (repl, captured)
    }

    #[tokio::test]
    async fn chat_turn_runs_tools_and_records_answer() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Scripted::new(vec![
            with_usage(ChatCompletion {
                content: None,
                tool_calls: vec![ToolCall::function(
                    "c1",
                    "write_file",
                    r#"{"path":"hello.txt","content":"hi\n"}"#,
                )],
                usage: None,
                finish_reason: None,
            }),
            with_usage(ChatCompletion::text("Created hello.txt")),
        ]);
        let (mut repl, out) = repl(dir.path(), Arc::clone(&backend));

        assert_eq!(repl.handle_line("make a greeting file").await, Flow::Continue);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(),
            "hi\n"
        );
        assert!(out.take().contains("Created hello.txt"));

        let turns = repl.conversation().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].text(), "Created hello.txt");
        assert_eq!(repl.usage().turns, 1);
        assert_eq!(repl.usage().prompt_tokens, 20);

        // The system prompt carries the working directory.
        let requests = backend.requests.lock().unwrap();
        assert!(
            requests[0].messages[0]
                .text()
                .contains(&dir.path().canonicalize().unwrap().display().to_string())
        );
    }

    #[tokio::test]
    async fn backend_error_is_printed() {
        let dir = tempfile::tempdir().unwrap();
        let (mut repl, out) = repl(dir.path(), Scripted::new(Vec::new()));
        assert_eq!(repl.handle_line("hello").await, Flow::Continue);
        assert!(out.take().contains("Error:"));
    }

    #[tokio::test]
    async fn slash_commands() {
        let dir = tempfile::tempdir().unwrap();
        let (mut repl, out) = repl(dir.path(), Scripted::new(Vec::new()));

        repl.handle_line("/help").await;
        assert!(out.take().contains("Slash Commands:"));

        repl.handle_line("/n").await;
        assert!(!repl.files.gate().auto_confirm());
        repl.handle_line("/yes").await;
        assert!(repl.files.gate().auto_confirm());
        out.take();

        repl.handle_line("/model grok4").await;
        assert_eq!(repl.model(), "grok4");
        assert!(out.take().contains("Model set to: grok4"));
        repl.handle_line("/model nope").await;
        assert!(out.take().contains("Unknown model"));

        repl.handle_line("/models").await;
        assert!(out.take().contains("grok-4-1-fast-reasoning"));

        repl.handle_line("/history").await;
        assert!(out.take().contains("No conversation history"));

        repl.handle_line("/bogus").await;
        assert!(out.take().contains("Unknown command: /bogus"));

        assert_eq!(repl.handle_line("/quit").await, Flow::Exit);
        assert_eq!(repl.handle_line("exit").await, Flow::Exit);
    }

    #[tokio::test]
    async fn save_writes_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut repl, out) = repl(dir.path(), Scripted::new(vec![ChatCompletion::text("hello")]));
        repl.handle_line("hi there").await;
        out.take();
        repl.handle_line("/save").await;
        assert!(out.take().contains("Session saved:"));

        let store = SessionStore::new(dir.path().join(".grok"));
        let record = store.load(None).unwrap();
        assert_eq!(record.get("last_assistant").unwrap().to_string(), "hello");
        assert_eq!(record.get("goal").unwrap().to_string(), "hi there");

        repl.handle_line("/clear").await;
        assert!(repl.conversation().is_empty());
    }

    #[tokio::test]
    async fn shell_and_plugin_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "remember\n").unwrap();
        let (mut repl, out) = repl(dir.path(), Scripted::new(Vec::new()));

        repl.handle_line("cat notes.txt").await;
        assert!(out.take().contains("remember"));

        repl.handle_line("cd ..").await;
        assert!(out.take().contains("SANDBOX VIOLATION"));

        repl.handle_line("echo a b").await;
        assert_eq!(out.take(), "a b\n");

        repl.handle_line("/plugins").await;
        assert!(out.take().contains("echo - Echo arguments"));

        // Nothing reached the model.
        assert!(repl.conversation().is_empty());
    }

    #[tokio::test]
    async fn create_writes_generated_file() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Scripted::new(vec![with_usage(ChatCompletion::text(
            "```python\nprint('hi')\n```",
        ))]);
        let (mut repl, out) = repl(dir.path(), Arc::clone(&backend));

        repl.handle_line("create python \"print hello world\"").await;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("print_hello_world.py")).unwrap(),
            "print('hi')\n"
        );
        let shown = out.take();
        assert!(shown.contains("Tokens: 15"));
        assert!(shown.contains("Successfully wrote"));
        assert!(repl.conversation().is_empty());
        assert_eq!(repl.usage().prompt_tokens, 10);

        let requests = backend.requests.lock().unwrap();
        assert!(requests[0].messages[0].text().contains("high-quality python code"));
        assert_eq!(
            requests[0].messages[1].text(),
            "Create a python file that: print hello world"
        );
    }

    #[tokio::test]
    async fn edit_rewrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("calc.py"), "x = 1\n").unwrap();
        let backend = Scripted::new(vec![with_usage(ChatCompletion::text("x = 2"))]);
        let (mut repl, out) = repl(dir.path(), Arc::clone(&backend));

        repl.handle_line("edit calc.py bump x").await;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("calc.py")).unwrap(),
            "x = 2\n"
        );
        assert!(out.take().contains("Updated: calc.py"));

        let requests = backend.requests.lock().unwrap();
        assert!(requests[0].messages[0].text().contains("editing a py file"));
        assert_eq!(requests[0].messages[1].text(), edit_request("x = 1\n", "bump x"));
    }

    #[tokio::test]
    async fn create_and_edit_usage_and_fallthrough() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("calc.py"), "x = 1\n").unwrap();
        let backend = Scripted::new(vec![
            ChatCompletion::text("Sure"),
            ChatCompletion::text("Done"),
        ]);
        let (mut repl, out) = repl(dir.path(), Arc::clone(&backend));

        repl.handle_line("create").await;
        assert!(out.take().contains("create requires <type> <description>"));
        repl.handle_line("create rs").await;
        assert!(out.take().contains("create requires <type> <description>"));
        repl.handle_line("edit calc.py").await;
        assert!(out.take().contains("edit requires <file> <instruction>"));
        assert!(backend.requests.lock().unwrap().is_empty());

        // Unknown type and missing file read as natural language.
        repl.handle_line("create a README for this project").await;
        repl.handle_line("edit the config to use tabs").await;
        assert_eq!(repl.conversation().turns().len(), 4);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("calc.py")).unwrap(),
            "x = 1\n"
        );
    }

    #[tokio::test]
    async fn run_reads_lines_until_exit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "remember\n").unwrap();
        let (repl, out) = repl(dir.path(), Scripted::new(Vec::new()));

        repl.with_input(Lines::scripted(["cat notes.txt", "exit", "cat notes.txt"]))
            .run()
            .await;
        let shown = out.take();
        assert_eq!(shown.matches("remember").count(), 1);
        assert!(shown.ends_with("Goodbye!\n"));
    }

    #[tokio::test]
    async fn heavy_needs_a_task() {
        let dir = tempfile::tempdir().unwrap();
        let (mut repl, out) = repl(dir.path(), Scripted::new(Vec::new()));
        repl.handle_line("heavy").await;
        assert!(out.take().contains("heavy requires a task"));
    }

    #[test]
    fn history_preview_truncates_on_chars() {
        let long = "é".repeat(150);
        let shown = preview(&long);
        assert_eq!(shown.chars().count(), HISTORY_PREVIEW_CHARS + 3);
        assert!(shown.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }
}
