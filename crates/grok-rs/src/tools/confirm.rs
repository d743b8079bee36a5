//! Confirmation gate for file mutations.
//!
//! Every write or edit pauses at a [`ConfirmGate`] before touching disk. The
//! gate resolves immediately to [`Decision::Accept`] when auto-confirm is on;
//! otherwise it asks its [`Confirmer`] (a terminal prompt in the CLI, a
//! scripted closure in tests). Decisions are serialized so only one prompt is
//! ever pending at a time, and [`ConfirmGate::cancel_pending`] resolves every
//! pending or queued prompt to [`Decision::Reject`].

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::validate::ValidationReport;

/// The user's answer to a pending mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
    /// Write to this path instead (re-checked against the sandbox).
    Rename(String),
}

/// What kind of mutation is awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Create,
    Overwrite,
    Edit,
    Copy,
    Move,
    Delete,
}

impl ConfirmAction {
    /// The question shown to the user.
    pub fn prompt(&self) -> &'static str {
        match self {
            ConfirmAction::Create => "Create this file?",
            ConfirmAction::Overwrite => "Overwrite this file?",
            ConfirmAction::Edit => "Apply this edit?",
            ConfirmAction::Copy => "Copy here?",
            ConfirmAction::Move => "Move here?",
            ConfirmAction::Delete => "Delete this?",
        }
    }

    /// Short label used in headers and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ConfirmAction::Create => "Create",
            ConfirmAction::Overwrite => "Overwrite",
            ConfirmAction::Edit => "Edit",
            ConfirmAction::Copy => "Copy",
            ConfirmAction::Move => "Move",
            ConfirmAction::Delete => "Delete",
        }
    }

    /// Whether the prompt may offer a rename.
    pub fn allows_rename(&self) -> bool {
        matches!(self, ConfirmAction::Create | ConfirmAction::Overwrite)
    }
}

/// Everything a confirmer needs to show before asking.
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub action: ConfirmAction,
    /// Resolved absolute path of the target.
    pub path: PathBuf,
    /// Unified diff for existing files, or a content preview for new ones.
    pub preview: String,
    /// Validator output for the proposed content, if a validator ran.
    pub validation: Option<ValidationReport>,
}

/// Future returned by [`Confirmer::confirm`].
pub type ConfirmFuture<'a> = Pin<Box<dyn Future<Output = Decision> + Send + 'a>>;

/// Source of confirmation decisions.
///
/// A confirmer may wait as long as it likes (on a terminal, for instance).
/// The gate drops the future when the prompt is cancelled.
pub trait Confirmer: Send + Sync {
    fn confirm<'a>(&'a self, request: &'a ConfirmRequest) -> ConfirmFuture<'a>;
}

/// Accepts everything.
pub struct AutoConfirm;

impl Confirmer for AutoConfirm {
    fn confirm<'a>(&'a self, _request: &'a ConfirmRequest) -> ConfirmFuture<'a> {
        Box::pin(std::future::ready(Decision::Accept))
    }
}

/// Rejects everything. Useful for read-only sessions.
pub struct RejectAll;

impl Confirmer for RejectAll {
    fn confirm<'a>(&'a self, _request: &'a ConfirmRequest) -> ConfirmFuture<'a> {
        Box::pin(std::future::ready(Decision::Reject))
    }
}

/// A confirmer backed by a closure.
pub struct FnConfirmer<F>(pub F)
where
    F: Fn(&ConfirmRequest) -> Decision + Send + Sync;

impl<F> Confirmer for FnConfirmer<F>
where
    F: Fn(&ConfirmRequest) -> Decision + Send + Sync,
{
    fn confirm<'a>(&'a self, request: &'a ConfirmRequest) -> ConfirmFuture<'a> {
        Box::pin(std::future::ready((self.0)(request)))
    }
}

// ── Gate ───────────────────────────────────────────────────────────

/// Shared confirmation state: the confirmer plus the process-wide
/// auto-confirm flag toggled by `/yes` and `/no`.
pub struct ConfirmGate {
    confirmer: Arc<dyn Confirmer>,
    auto: AtomicBool,
    serial: tokio::sync::Mutex<()>,
    cancel: Mutex<CancellationToken>,
}

impl ConfirmGate {
    pub fn new(confirmer: Arc<dyn Confirmer>, auto_confirm: bool) -> Self {
        Self {
            confirmer,
            auto: AtomicBool::new(auto_confirm),
            serial: tokio::sync::Mutex::new(()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// A gate that accepts everything without prompting.
    pub fn auto() -> Self {
        Self::new(Arc::new(AutoConfirm), true)
    }

    pub fn auto_confirm(&self) -> bool {
        self.auto.load(Ordering::SeqCst)
    }

    pub fn set_auto_confirm(&self, enabled: bool) {
        self.auto.store(enabled, Ordering::SeqCst);
    }

    /// Resolve a request, waiting on the confirmer if needed.
    pub async fn decide(&self, request: &ConfirmRequest) -> Decision {
        if self.auto_confirm() {
            debug!(path = %request.path.display(), action = request.action.label(), "Auto-confirmed");
            return Decision::Accept;
        }
        let cancelled = self
            .cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let decision = tokio::select! {
            decision = async {
                let _turn = self.serial.lock().await;
                self.confirmer.confirm(request).await
            } => decision,
            _ = cancelled.cancelled() => {
                debug!(path = %request.path.display(), "Confirmation cancelled");
                Decision::Reject
            }
        };
        debug!(
            path = %request.path.display(),
            action = request.action.label(),
            ?decision,
            "Confirmation resolved"
        );
        decision
    }

    /// Reject every prompt that is pending or queued right now. Prompts
    /// started afterwards ask as usual.
    pub fn cancel_pending(&self) {
        let mut token = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        token.cancel();
        *token = CancellationToken::new();
    }
}

impl Default for ConfirmGate {
    fn default() -> Self {
        Self::new(Arc::new(RejectAll), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn request(action: ConfirmAction) -> ConfirmRequest {
        ConfirmRequest {
            action,
            path: PathBuf::from("/tmp/x.txt"),
            preview: String::new(),
            validation: None,
        }
    }

    /// Waits forever, like a terminal nobody answers.
    #[derive(Default)]
    struct Unanswered {
        asked: AtomicUsize,
    }

    impl Confirmer for Unanswered {
        fn confirm<'a>(&'a self, _request: &'a ConfirmRequest) -> ConfirmFuture<'a> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Box::pin(std::future::pending())
        }
    }

    #[test]
    fn prompts_match_action() {
        assert_eq!(ConfirmAction::Create.prompt(), "Create this file?");
        assert_eq!(ConfirmAction::Overwrite.prompt(), "Overwrite this file?");
        assert_eq!(ConfirmAction::Edit.prompt(), "Apply this edit?");
        assert_eq!(ConfirmAction::Delete.prompt(), "Delete this?");
        assert!(!ConfirmAction::Edit.allows_rename());
        assert!(!ConfirmAction::Move.allows_rename());
        assert!(ConfirmAction::Overwrite.allows_rename());
    }

    #[tokio::test]
    async fn auto_flag_bypasses_confirmer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let gate = ConfirmGate::new(
            Arc::new(FnConfirmer(move |_: &ConfirmRequest| {
                counter.fetch_add(1, Ordering::SeqCst);
                Decision::Reject
            })),
            true,
        );
        assert_eq!(gate.decide(&request(ConfirmAction::Create)).await, Decision::Accept);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        gate.set_auto_confirm(false);
        assert_eq!(gate.decide(&request(ConfirmAction::Create)).await, Decision::Reject);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn default_gate_rejects() {
        let gate = ConfirmGate::default();
        assert!(!gate.auto_confirm());
        assert_eq!(gate.decide(&request(ConfirmAction::Edit)).await, Decision::Reject);
    }

    #[tokio::test]
    async fn decision_comes_from_confirmer() {
        let gate = ConfirmGate::new(
            Arc::new(FnConfirmer(|req: &ConfirmRequest| {
                if req.action == ConfirmAction::Overwrite {
                    Decision::Rename("other.txt".into())
                } else {
                    Decision::Accept
                }
            })),
            false,
        );
        assert_eq!(
            gate.decide(&request(ConfirmAction::Overwrite)).await,
            Decision::Rename("other.txt".into())
        );
        assert_eq!(gate.decide(&request(ConfirmAction::Edit)).await, Decision::Accept);
    }

    #[tokio::test]
    async fn cancel_rejects_pending_prompts() {
        let confirmer = Arc::new(Unanswered::default());
        let gate = Arc::new(ConfirmGate::new(confirmer.clone(), false));

        let waiting: Vec<_> = (0..2)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.decide(&request(ConfirmAction::Edit)).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;
        // One prompt is shown, the other queues behind it.
        assert_eq!(confirmer.asked.load(Ordering::SeqCst), 1);

        gate.cancel_pending();
        for task in waiting {
            assert_eq!(task.await.unwrap(), Decision::Reject);
        }

        // A prompt started after the cancel waits for an answer again.
        let req = request(ConfirmAction::Edit);
        let later = gate.decide(&req);
        assert!(
            tokio::time::timeout(Duration::from_millis(20), later)
                .await
                .is_err()
        );
        assert_eq!(confirmer.asked.load(Ordering::SeqCst), 2);
    }
}
