//! Plugins compiled into the binary.

use grok_rs::agent::SessionStore;
use grok_rs::plugins::{Plugin, PluginCommand, PluginRegistry};

/// `sessions`: list saved sessions of the project, newest first, marking
/// the one `grok resume` would load.
pub struct SessionsPlugin {
    store: SessionStore,
}

impl SessionsPlugin {
    pub fn new(store: SessionStore) -> Self {
        Self { store }
    }
}

impl Plugin for SessionsPlugin {
    fn name(&self) -> &str {
        "sessions"
    }

    fn description(&self) -> &str {
        "Saved session browser"
    }

    fn commands(&self) -> Vec<PluginCommand> {
        let store = self.store.clone();
        vec![PluginCommand::new(
            "sessions",
            "List saved sessions",
            move |_args| list_sessions(&store),
        )]
    }
}

pub fn list_sessions(store: &SessionStore) -> Result<String, String> {
    let sessions = store.list().map_err(|e| e.to_string())?;
    if sessions.is_empty() {
        return Ok("No saved sessions".to_string());
    }
    let current = store.current();
    let lines: Vec<String> = sessions
        .iter()
        .map(|path| {
            let marker = if current.as_deref() == Some(path.as_path()) { "*" } else { " " };
            let name = path.file_name().map_or_else(
                || path.display().to_string(),
                |n| n.to_string_lossy().into_owned(),
            );
            format!("{marker} {name}")
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Registry with every built-in plugin.
pub fn builtin(store: SessionStore) -> PluginRegistry {
    PluginRegistry::new().with(SessionsPlugin::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grok_rs::context::{CompressionMode, Record, Value};

    #[test]
    fn lists_and_marks_current() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let registry = builtin(store.clone());
        let command = registry.command("sessions").unwrap();
        assert_eq!(command.run(&[]).unwrap(), "No saved sessions");

        let mut record = Record::new();
        record.insert("goal".into(), Value::from("ship it"));
        let saved = store.save(record, CompressionMode::Never).unwrap();

        let listing = command.run(&[]).unwrap();
        let name = saved.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(listing, format!("* {name}"));
    }
}
