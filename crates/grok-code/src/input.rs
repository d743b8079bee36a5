//! Line input shared by the REPL and the confirmation prompt.
//!
//! One thread owns stdin and forwards each line over a channel. Whoever
//! awaits [`Lines::next`] receives the next line; a caller that stops
//! waiting (an interrupted prompt, say) leaves it for the next reader.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Cloneable handle on a line stream.
#[derive(Clone)]
pub struct Lines {
    rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

impl Lines {
    /// Start the stdin reader thread. Lines arrive without their newline.
    pub fn stdin() -> Self {
        let (tx, lines) = Self::channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("Stdin reader finished");
        });
        lines
    }

    /// A stream fed by the returned sender. It ends when the sender drops.
    pub fn channel() -> (mpsc::UnboundedSender<String>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                rx: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// Fixed lines, then end of input.
    pub fn scripted<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, this) = Self::channel();
        for line in lines {
            let _ = tx.send(line.into());
        }
        this
    }

    /// The next line, or `None` once input has ended. Cancel-safe.
    pub async fn next(&self) -> Option<String> {
        self.rx.lock().await.recv().await
    }
}

impl Default for Lines {
    /// Already at end of input.
    fn default() -> Self {
        Self::scripted(std::iter::empty::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn scripted_lines_then_end() {
        let lines = Lines::scripted(["a", "b"]);
        let other = lines.clone();
        assert_eq!(lines.next().await.as_deref(), Some("a"));
        assert_eq!(other.next().await.as_deref(), Some("b"));
        assert_eq!(lines.next().await, None);
        assert_eq!(Lines::default().next().await, None);
    }

    #[tokio::test]
    async fn abandoned_read_does_not_consume_a_line() {
        let (tx, lines) = Lines::channel();
        let waiting = tokio::time::timeout(Duration::from_millis(20), lines.next()).await;
        assert!(waiting.is_err());

        tx.send("y".to_string()).unwrap();
        assert_eq!(lines.next().await.as_deref(), Some("y"));
    }
}
