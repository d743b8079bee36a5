//! Grok CLI binary.
//!
//! Reads the API key from `XAI_API_KEY`.
//!
//! ```sh
//! # Interactive mode
//! grok
//!
//! # One-shot question, no tools
//! grok ask "Explain the borrow checker"
//!
//! # Three experts and a coordinator
//! grok heavy "Design a rate limiter"
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use grok_code::config::{GrokConfig, GrokPaths, RunOptions};
use grok_code::repl::{Repl, cache_report, models_table};
use grok_code::{ASK_PROMPT, Lines, TerminalConfirmer, plugins};
use grok_rs::agent::{Conversation, Harness, HeavyConfig, SessionError, SessionStore, run_heavy};
use grok_rs::api::ResponseCache;
use grok_rs::context::CompressionMode;
use grok_rs::logging::{ConsoleLayer, level_for_verbosity};
use grok_rs::sandbox::Sandbox;
use grok_rs::tools::ToolSet;
use grok_rs::{ChatBackend, Message, XaiClient};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Terminal assistant for xAI Grok models.
#[derive(Parser)]
#[command(name = "grok", version)]
struct Cli {
    /// Model alias or API model string.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Auto-confirm file operations.
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Maximum tool-use rounds per turn.
    #[arg(long, default_value_t = 10, global = true)]
    max_rounds: u32,

    /// Maximum tokens per response.
    #[arg(long, default_value_t = 8192, global = true)]
    max_tokens: u32,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.7, global = true)]
    temperature: f32,

    /// Bypass the response cache.
    #[arg(long, global = true)]
    no_cache: bool,

    /// Session compression mode: always, smart or never.
    #[arg(long, global = true)]
    compress: Option<CompressionMode>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Allow file access anywhere on the filesystem.
    #[arg(long)]
    dangerously_allow_entire_fs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a one-shot question without file tools.
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
    },
    /// Run a task through three experts and a coordinator.
    Heavy {
        #[arg(required = true)]
        task: Vec<String>,
    },
    /// Resume the last session and enter the REPL.
    Resume {
        /// Start a fresh session instead.
        #[arg(long)]
        new: bool,
        /// List saved sessions and exit.
        #[arg(long)]
        list: bool,
    },
    /// List available models.
    Models,
    /// Inspect or clear the response cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache size and age.
    Stats,
    /// Delete every cached response.
    Clear,
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            model: self.model.clone(),
            yes: self.yes,
            max_rounds: self.max_rounds,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            no_cache: self.no_cache,
            compress: self.compress,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(ConsoleLayer::new(level_for_verbosity(cli.verbose)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let launch = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {e}"))?;
    let paths = GrokPaths::discover(&launch)?;
    paths.ensure()?;

    let (config, first_run) = GrokConfig::load_or_create(&paths.config_file())?;
    let config = config.apply_env(|key| std::env::var(key).ok());
    if first_run {
        eprintln!(
            "Welcome to Grok CLI! Created {}\nSet XAI_API_KEY to get started.",
            paths.config_file().display()
        );
    }

    let options = cli.run_options();
    let store = SessionStore::new(&paths.project);
    let cache = (!options.no_cache).then(|| {
        let cache = ResponseCache::new(paths.cache_dir());
        match cache.prune() {
            Ok(0) => {}
            Ok(n) => info!("Pruned {n} cached responses"),
            Err(e) => warn!("Cache prune failed: {e}"),
        }
        Arc::new(cache)
    });

    let conversation = match cli.command {
        Some(Command::Models) => {
            print!("{}", models_table());
            return Ok(());
        }
        Some(Command::Cache { action }) => {
            let cache = ResponseCache::new(paths.cache_dir());
            match action {
                CacheAction::Stats => {
                    let sessions = store.list().map_err(|e| e.to_string())?.len();
                    println!("{}", cache_report(&cache.stats(), sessions));
                }
                CacheAction::Clear => println!("Cleared {} cached responses", cache.clear()),
            }
            return Ok(());
        }
        Some(Command::Ask { question }) => {
            let backend = client()?;
            let mut harness_config = config
                .build_harness_config(&options, ASK_PROMPT)?
                .with_streaming(false);
            if let Some(cache) = &cache {
                harness_config = harness_config.with_cache(Arc::clone(cache));
            }
            let tools = ToolSet::new();
            let result = Harness::new(backend.as_ref(), &tools, harness_config)
                .run(vec![Message::user(question.join(" "))])
                .await?;
            println!("{}", result.text);
            return Ok(());
        }
        Some(Command::Heavy { task }) => {
            let backend = client()?;
            let context = match store.load(None) {
                Ok(record) => Some(record),
                Err(SessionError::NoCurrentSession) => None,
                Err(e) => return Err(e.to_string()),
            };
            let mut heavy = HeavyConfig::default();
            if let Some(cache) = &cache {
                heavy = heavy.with_cache(Arc::clone(cache));
            }
            let result = run_heavy(backend, &task.join(" "), context.as_ref(), &heavy).await?;
            println!("{}", result.answer);
            eprintln!("\nHeavy mode: {} tokens", result.total_tokens);
            return Ok(());
        }
        Some(Command::Resume { list: true, .. }) => {
            println!("{}", plugins::list_sessions(&store)?);
            return Ok(());
        }
        Some(Command::Resume { new: true, .. }) => {
            store.clear_current().map_err(|e| e.to_string())?;
            println!("Starting new session");
            Conversation::new()
        }
        Some(Command::Resume { .. }) => resume(&store)?,
        None => Conversation::new(),
    };

    let context = Context {
        launch,
        paths,
        config,
        options,
        cache,
        store,
    };
    interactive(context, cli.dangerously_allow_entire_fs, conversation).await
}

/// Everything the REPL is built from.
struct Context {
    launch: PathBuf,
    paths: GrokPaths,
    config: GrokConfig,
    options: RunOptions,
    cache: Option<Arc<ResponseCache>>,
    store: SessionStore,
}

fn client() -> Result<Arc<dyn ChatBackend>, String> {
    let client = XaiClient::from_env()?;
    if !client.has_api_key() {
        warn!("{}", grok_rs::MISSING_KEY_MESSAGE);
    }
    Ok(Arc::new(client))
}

fn resume(store: &SessionStore) -> Result<Conversation, String> {
    match store.load(None) {
        Ok(record) => {
            println!("Resumed session");
            if let Some(cwd) = record.get("cwd") {
                println!("  CWD: {cwd}");
            }
            if let Some(goal) = record.get("goal") {
                println!("  Goal: {goal}");
            }
            Ok(Conversation::from_record(&record))
        }
        Err(SessionError::NoCurrentSession | SessionError::NotFound(_)) => {
            println!("No session found. Starting new session.");
            Ok(Conversation::new())
        }
        Err(e) => Err(e.to_string()),
    }
}

/// Ask for `YES` before lifting the sandbox.
fn confirm_entire_fs() -> bool {
    eprintln!("WARNING: file tools will be able to read and write anywhere on this machine.");
    eprint!("Type YES to continue: ");
    let _ = std::io::stderr().flush();
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer).is_ok() && answer.trim() == "YES"
}

async fn interactive(
    context: Context,
    entire_fs: bool,
    conversation: Conversation,
) -> Result<(), String> {
    let sandbox = if entire_fs {
        if !confirm_entire_fs() {
            return Err("Entire-filesystem access not confirmed".to_string());
        }
        Sandbox::unrestricted(&context.launch)
    } else {
        Sandbox::new(&context.launch)
    }
    .map_err(|e| e.to_string())?;

    let backend = client()?;
    let lines = Lines::stdin();
    let Context {
        paths,
        config,
        options,
        cache,
        store,
        ..
    } = context;
    let confirmer = Arc::new(TerminalConfirmer::stdio(lines.clone()));
    let (tools, files) = config.build_tool_set(&options, Arc::new(sandbox), confirmer);
    let registry = plugins::builtin(store);

    Repl::new(backend, tools, files, config, options, paths)
        .with_cache(cache)
        .with_plugins(registry)
        .with_conversation(conversation)
        .with_input(lines)
        .run()
        .await;
    Ok(())
}
