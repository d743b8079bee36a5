//! Console tracing layer.
//!
//! [`ConsoleLayer`] formats events as `HH:MM:SS LEVEL message {k=v, ...}`
//! and writes them to stderr when they pass the configured threshold, so
//! diagnostics never interleave with the answer on stdout.
//!
//! ```ignore
//! use tracing_subscriber::prelude::*;
//!
//! tracing_subscriber::registry()
//!     .with(ConsoleLayer::new(level_for_verbosity(args.verbose)))
//!     .init();
//! ```

use std::io::Write;
use std::sync::Mutex;

use chrono::Local;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::Layer;
use tracing_subscriber::registry::LookupSpan;

/// Threshold for a `-v` count: WARN, INFO, DEBUG, then TRACE.
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// A [`tracing_subscriber::Layer`] printing one line per event.
pub struct ConsoleLayer {
    threshold: Level,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleLayer {
    /// Write to stderr.
    pub fn new(threshold: Level) -> Self {
        Self::with_writer(threshold, std::io::stderr())
    }

    pub fn with_writer(threshold: Level, writer: impl Write + Send + 'static) -> Self {
        Self {
            threshold,
            sink: Mutex::new(Box::new(writer)),
        }
    }

    pub fn threshold(&self) -> Level {
        self.threshold
    }
}

/// Render one event line (without trailing newline).
pub fn format_line(time: &str, level: &Level, message: &str, fields: &[(String, String)]) -> String {
    let mut line = format!("{time} {level:<5} {message}");
    if !fields.is_empty() {
        let extras: Vec<String> = fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
        if message.is_empty() {
            line.push_str(&extras.join(" "));
        } else {
            line.push_str(&format!(" {{{}}}", extras.join(", ")));
        }
    }
    line
}

impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for ConsoleLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = event.metadata().level();
        // More verbose levels compare greater.
        if *level > self.threshold {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let time = Local::now().format("%H:%M:%S").to_string();
        let line = format_line(&time, level, &visitor.message, &visitor.fields);

        let mut sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(sink, "{line}");
    }
}

/// Extracts the message and extra fields from an event.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let raw = format!("{value:?}");
        if field.name() == "message" {
            self.message = raw
                .strip_prefix('"')
                .and_then(|r| r.strip_suffix('"'))
                .map(str::to_string)
                .unwrap_or(raw);
        } else {
            self.fields.push((field.name().to_string(), raw));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }
}
