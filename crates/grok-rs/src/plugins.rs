//! Compile-time plugin registry.
//!
//! A [`Plugin`] contributes named REPL commands. Plugins are registered in
//! code with [`PluginRegistry::with`]; there is no dynamic loading.
//!
//! ```ignore
//! let registry = PluginRegistry::new().with(WordCount);
//! if let Some(cmd) = registry.command("wc") {
//!     println!("{}", (cmd.handler)(&args)?);
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handler of a plugin command. Receives the whitespace-split arguments.
pub type CommandHandler = Arc<dyn Fn(&[String]) -> Result<String, String> + Send + Sync>;

/// A named command contributed by a plugin.
#[derive(Clone)]
pub struct PluginCommand {
    pub name: String,
    pub description: String,
    pub handler: CommandHandler,
}

impl PluginCommand {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&[String]) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            handler: Arc::new(handler),
        }
    }

    pub fn run(&self, args: &[String]) -> Result<String, String> {
        (self.handler)(args)
    }
}

impl fmt::Debug for PluginCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCommand")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// A bundle of commands.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn commands(&self) -> Vec<PluginCommand>;
}

/// Summary of a registered plugin for `/plugins`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
    pub commands: Vec<String>,
}

/// Registered plugins and their commands. The first registration of a
/// command name wins.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<PluginInfo>,
    commands: Vec<PluginCommand>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, plugin: impl Plugin + 'static) -> Self {
        self.register(&plugin);
        self
    }

    pub fn register(&mut self, plugin: &dyn Plugin) {
        let mut names = Vec::new();
        for command in plugin.commands() {
            if self.command(&command.name).is_some() {
                warn!(
                    "Plugin {} redefines command {}; keeping the first",
                    plugin.name(),
                    command.name
                );
                continue;
            }
            names.push(command.name.clone());
            self.commands.push(command);
        }
        debug!("Registered plugin {} ({} commands)", plugin.name(), names.len());
        self.plugins.push(PluginInfo {
            name: plugin.name().to_string(),
            description: plugin.description().to_string(),
            commands: names,
        });
    }

    pub fn command(&self, name: &str) -> Option<&PluginCommand> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn plugins(&self) -> &[PluginInfo] {
        &self.plugins
    }

    pub fn commands(&self) -> &[PluginCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
